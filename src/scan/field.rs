//! Per-field PII scanning over parsed rows
//!
//! Responsibilities:
//! - Run the engine over every text field of every row in a chunk
//! - Apply the mask policy and replace field values in place
//! - Isolate engine failures to the single field that raised them
//! - Aggregate per-chunk security metrics

use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::warn;

use crate::chunk::{FileChunk, Row, Value};
use crate::scan::engine::PiiEngine;
use crate::scan::types::{MaskPolicy, PiiFinding, PiiType, SecurityMetrics};

/// Chunks with at least this many rows are scanned on the rayon pool.
const PARALLEL_ROW_THRESHOLD: usize = 64;

/// Result of scanning one chunk's rows.
pub struct ScannedChunk {
    pub rows: Vec<Row>,
    pub findings: Vec<PiiFinding>,
    pub metrics: SecurityMetrics,
}

/// Scans row fields for PII and masks them according to policy.
///
/// A scanner is immutable and shared across the whole session; all per-chunk
/// state lives in the returned `ScannedChunk`.
pub struct FieldScanner {
    engine: Arc<dyn PiiEngine>,
    policy: MaskPolicy,
    preserve_pii: bool,
}

impl FieldScanner {
    pub fn new(engine: Arc<dyn PiiEngine>, policy: MaskPolicy, preserve_pii: bool) -> Self {
        Self { engine, policy, preserve_pii }
    }

    /// Scan every row of a chunk, preserving row order.
    pub fn scan_chunk(&self, chunk: &FileChunk) -> ScannedChunk {
        let scanned: Vec<(Row, SmallVec<[PiiFinding; 4]>)> =
            if chunk.rows.len() >= PARALLEL_ROW_THRESHOLD {
                chunk.rows.par_iter().map(|row| self.scan_row(row)).collect()
            } else {
                chunk.rows.iter().map(|row| self.scan_row(row)).collect()
            };

        let mut rows = Vec::with_capacity(scanned.len());
        let mut findings = Vec::new();
        let mut metrics = SecurityMetrics::default();
        for (row, row_findings) in scanned {
            for finding in &row_findings {
                metrics.pii_items_found += 1;
                metrics.fields_with_pii.insert(finding.field_name.clone());
                if finding.masked_value.is_some() {
                    metrics.masking_applied = true;
                }
            }
            findings.extend(row_findings);
            rows.push(row);
        }

        ScannedChunk { rows, findings, metrics }
    }

    /// Scan one row. Field names and order pass through unchanged; only
    /// values flagged for masking are rewritten.
    pub fn scan_row(&self, row: &Row) -> (Row, SmallVec<[PiiFinding; 4]>) {
        let mut out = Row::with_capacity(row.len());
        let mut findings: SmallVec<[PiiFinding; 4]> = SmallVec::new();

        for (name, value) in row.iter() {
            let text = match value.as_text() {
                Some(text) => text,
                None => {
                    out.push(name, value.clone());
                    continue;
                }
            };

            let detections = match self.engine.detect(text) {
                Ok(detections) => detections,
                Err(e) => {
                    // Failure in one field never poisons the rest of the row.
                    warn!(field = name, "pii detection failed: {e}");
                    out.push(name, value.clone());
                    continue;
                }
            };

            if detections.is_empty() {
                out.push(name, value.clone());
                continue;
            }

            let types: SmallVec<[PiiType; 4]> =
                detections.iter().map(|d| d.pii_type).collect();
            let masked = if !self.preserve_pii && self.policy.should_mask(&types) {
                match self.engine.mask(text) {
                    Ok(masked) => Some(masked),
                    Err(e) => {
                        // Original value passes through rather than losing data.
                        warn!(field = name, "pii masking failed: {e}");
                        None
                    }
                }
            } else {
                None
            };

            for detection in detections {
                findings.push(PiiFinding {
                    field_name: name.to_string(),
                    pii_type: detection.pii_type,
                    confidence: detection.confidence,
                    masked_value: masked.clone(),
                });
            }

            match masked {
                Some(masked) => out.push(name, Value::Text(masked)),
                None => out.push(name, value.clone()),
            }
        }

        (out, findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkInfo;
    use crate::error::EngineError;
    use crate::scan::engine::{Detection, RegexEngine};

    fn chunk_of(rows: Vec<Row>) -> FileChunk {
        FileChunk {
            info: ChunkInfo {
                chunk_index: 0,
                start_byte: 0,
                end_byte: 1,
                total_size: 1,
                total_chunks: 1,
                is_last_chunk: true,
            },
            rows,
        }
    }

    fn scanner() -> FieldScanner {
        FieldScanner::new(
            Arc::new(RegexEngine::new().unwrap()),
            MaskPolicy::default(),
            false,
        )
    }

    #[test]
    fn test_clean_row_passes_through_unchanged() {
        let mut row = Row::new();
        row.push("name", Value::Text("John".into()));
        row.push("count", Value::Number(3.0));

        let (out, findings) = scanner().scan_row(&row);
        assert_eq!(out, row);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_email_field_is_masked() {
        let mut row = Row::new();
        row.push("email", Value::Text("john@test.com".into()));

        let (out, findings) = scanner().scan_row(&row);
        assert_eq!(out.get("email"), Some(&Value::Text("j***@test.com".into())));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pii_type, PiiType::Email);
        assert_eq!(findings[0].masked_value.as_deref(), Some("j***@test.com"));
    }

    #[test]
    fn test_preserve_pii_detects_without_masking() {
        let mut row = Row::new();
        row.push("email", Value::Text("john@test.com".into()));

        let scanner = FieldScanner::new(
            Arc::new(RegexEngine::new().unwrap()),
            MaskPolicy::default(),
            true,
        );
        let (out, findings) = scanner.scan_row(&row);
        assert_eq!(out.get("email"), Some(&Value::Text("john@test.com".into())));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].masked_value.is_none());
    }

    #[test]
    fn test_disabled_policy_skips_masking() {
        let mut row = Row::new();
        row.push("email", Value::Text("john@test.com".into()));

        let policy: MaskPolicy = serde_json::from_str(r#"{"email": false}"#).unwrap();
        let scanner =
            FieldScanner::new(Arc::new(RegexEngine::new().unwrap()), policy, false);
        let (out, findings) = scanner.scan_row(&row);
        assert_eq!(out.get("email"), Some(&Value::Text("john@test.com".into())));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].masked_value.is_none());
    }

    struct FailingEngine;

    impl PiiEngine for FailingEngine {
        fn detect(&self, text: &str) -> Result<Vec<Detection>, EngineError> {
            if text.contains("boom") {
                Err(EngineError::Detection("induced failure".into()))
            } else if text.contains('@') {
                Ok(vec![Detection { pii_type: PiiType::Email, confidence: 0.95 }])
            } else {
                Ok(Vec::new())
            }
        }

        fn mask(&self, _text: &str) -> Result<String, EngineError> {
            Err(EngineError::Masking("induced failure".into()))
        }
    }

    #[test]
    fn test_engine_failure_isolated_to_one_field() {
        let mut row = Row::new();
        row.push("a", Value::Text("boom".into()));
        row.push("email", Value::Text("john@test.com".into()));

        let scanner =
            FieldScanner::new(Arc::new(FailingEngine), MaskPolicy::default(), false);
        let (out, findings) = scanner.scan_row(&row);

        // The failing field keeps its value; the other field is still scanned.
        assert_eq!(out.get("a"), Some(&Value::Text("boom".into())));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field_name, "email");
        // Masking failed, so the original value passes through.
        assert_eq!(out.get("email"), Some(&Value::Text("john@test.com".into())));
        assert!(findings[0].masked_value.is_none());
    }

    #[test]
    fn test_chunk_metrics_rollup() {
        let mut row1 = Row::new();
        row1.push("email", Value::Text("a@test.com".into()));
        row1.push("note", Value::Text("fine".into()));
        let mut row2 = Row::new();
        row2.push("email", Value::Text("b@test.com".into()));
        row2.push("note", Value::Text("also fine".into()));

        let scanned = scanner().scan_chunk(&chunk_of(vec![row1, row2]));
        assert_eq!(scanned.rows.len(), 2);
        assert_eq!(scanned.metrics.pii_items_found, 2);
        assert!(scanned.metrics.masking_applied);
        assert_eq!(scanned.metrics.fields_with_pii.len(), 1);
        assert!(scanned.metrics.fields_with_pii.contains("email"));
    }

    #[test]
    fn test_parallel_scan_preserves_row_order() {
        let rows: Vec<Row> = (0..200)
            .map(|i| {
                let mut row = Row::new();
                row.push("id", Value::Text(format!("row-{i}")));
                row.push("email", Value::Text(format!("user{i}@test.com")));
                row
            })
            .collect();

        let scanned = scanner().scan_chunk(&chunk_of(rows));
        assert_eq!(scanned.rows.len(), 200);
        for (i, row) in scanned.rows.iter().enumerate() {
            assert_eq!(row.get("id"), Some(&Value::Text(format!("row-{i}"))));
        }
        assert_eq!(scanned.metrics.pii_items_found, 200);
    }
}
