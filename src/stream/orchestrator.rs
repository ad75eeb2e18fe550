//! Session orchestration
//!
//! Responsibilities:
//! - Drive the read -> scan -> emit loop for one file
//! - Enforce the chunk-size clamp and the per-session row limit
//! - Publish events to the sink in a fixed order per chunk
//! - Check for cancellation only at chunk boundaries
//!
//! The orchestrator is synchronous; async boundaries (SSE) run it on a
//! blocking worker and bridge events over a channel.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::chunk::advisor::{self, DEFAULT_CHUNK_SIZE};
use crate::chunk::ChunkReader;
use crate::error::Result;
use crate::scan::{FieldScanner, MaskPolicy, PiiEngine, PiiSummary};
use crate::stream::events::{
    ChunkEvent, ConnectedEvent, PiiDetectedEvent, StreamSink, StreamSummary,
};
use crate::stream::memory::{MemoryGuard, MemoryPressure};
use crate::stream::progress::ProgressTracker;

/// Lifecycle of one streaming session. Transitions are one-way; every
/// session ends in exactly one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Streaming,
    Completing,
    Completed,
    Failed,
    Cancelled,
}

/// Caller-supplied knobs for one session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamOptions {
    /// Requested chunk size in bytes; clamped to the supported range. When
    /// absent the default chunk size is used.
    pub chunk_size: Option<u64>,
    /// Detect but never mask.
    #[serde(rename = "preservePII")]
    pub preserve_pii: bool,
    #[serde(rename = "maskingOptions")]
    pub mask_policy: Option<MaskPolicy>,
    /// Stop after this many rows; the session still completes normally.
    pub max_rows: Option<u64>,
    /// Fail the session on the first malformed row instead of skipping it.
    pub strict: bool,
}

/// Runs streaming sessions against a shared PII engine.
pub struct StreamOrchestrator {
    engine: Arc<dyn PiiEngine>,
}

impl StreamOrchestrator {
    pub fn new(engine: Arc<dyn PiiEngine>) -> Self {
        Self { engine }
    }

    /// Stream one file to completion, cancellation, or failure.
    ///
    /// `cancel` is polled between chunks only; an in-flight chunk always
    /// finishes and is delivered before the session stops. On success the
    /// summary covers everything delivered, including truncated and
    /// cancelled sessions.
    pub fn stream(
        &self,
        path: &Path,
        options: &StreamOptions,
        cancel: &AtomicBool,
        sink: &mut dyn StreamSink,
    ) -> Result<StreamSummary> {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!("stream", session = %session_id);
        let _guard = span.enter();

        let mut state = SessionState::Initializing;
        debug!(?state, path = %path.display(), "session starting");

        let mut reader = ChunkReader::open(path, options.strict)?;
        let total_bytes = reader.total_size();

        let mut chunk_size = match options.chunk_size {
            Some(requested) => {
                let clamped = advisor::clamp_requested(requested);
                if let Some(warning) = &clamped.warning {
                    warn!("{warning}");
                }
                clamped.chunk_size
            }
            None => DEFAULT_CHUNK_SIZE,
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sink.on_connected(&ConnectedEvent {
            session_id: session_id.clone(),
            filename,
            total_bytes,
            chunk_size: chunk_size as usize,
            estimated_chunks: advisor::estimate_chunks(total_bytes, chunk_size),
        });

        let scanner = FieldScanner::new(
            self.engine.clone(),
            options.mask_policy.unwrap_or_default(),
            options.preserve_pii,
        );
        let mut tracker = ProgressTracker::new(total_bytes);
        let mut memory = MemoryGuard::new();
        let mut pii_summary = PiiSummary::default();
        let mut cancelled = false;

        state = SessionState::Streaming;
        debug!(?state, chunk_size, "reading chunks");
        loop {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                state = SessionState::Cancelled;
                info!("session cancelled at chunk boundary");
                break;
            }

            let Some(mut chunk) = reader.read_chunk(chunk_size)? else {
                break;
            };

            // Row limit: truncate the final chunk and finish normally.
            let mut hit_row_limit = false;
            if let Some(max_rows) = options.max_rows {
                let remaining = max_rows.saturating_sub(tracker.rows_processed());
                let rows_read = chunk.rows.len() as u64;
                if rows_read >= remaining {
                    chunk.rows.truncate(remaining as usize);
                    // Progress counts bytes for rows delivered, so the
                    // dropped tail of a truncated chunk is pro-rated away.
                    if remaining < rows_read {
                        let span = chunk.info.end_byte - chunk.info.start_byte;
                        chunk.info.end_byte = (chunk.info.start_byte
                            + span * remaining / rows_read.max(1))
                        .max(chunk.info.start_byte + 1);
                    }
                    chunk.info.is_last_chunk = true;
                    hit_row_limit = true;
                }
            }

            let scanned = scanner.scan_chunk(&chunk);
            pii_summary.merge(&scanned.findings);

            // Memory pressure is advisory; the one lever this loop has is
            // the size of subsequent reads.
            if memory.sample().pressure == MemoryPressure::Critical
                && chunk_size > advisor::MIN_CHUNK_SIZE
            {
                chunk_size = (chunk_size / 2).max(advisor::MIN_CHUNK_SIZE);
                warn!(chunk_size, "shrinking chunk reads under memory pressure");
            }

            let rows_in_chunk = scanned.rows.len() as u64;
            let progress = tracker.record_chunk(
                chunk.info.end_byte,
                rows_in_chunk,
                chunk.info.total_chunks,
            );
            let chunk_index = chunk.info.chunk_index;
            let is_last = chunk.info.is_last_chunk;
            let pii_detected = scanned.findings.len() as u64;

            sink.on_progress(&progress);
            sink.on_chunk(&ChunkEvent {
                info: chunk.info,
                rows: scanned.rows,
                rows_in_chunk,
                total_rows_processed: tracker.rows_processed(),
                pii_detected,
                security_metrics: scanned.metrics,
            });
            if pii_detected > 0 {
                let mut types: Vec<_> =
                    scanned.findings.iter().map(|f| f.pii_type).collect();
                types.sort();
                types.dedup();
                sink.on_pii_detected(&PiiDetectedEvent {
                    chunk_index,
                    count: scanned.findings.len() as u64,
                    total_pii_detected: pii_summary.total_pii_items,
                    types,
                });
            }

            if is_last || hit_row_limit {
                break;
            }
        }

        if !cancelled {
            state = SessionState::Completing;
            debug!(?state, "assembling summary");
        }
        let summary = StreamSummary {
            total_rows: tracker.rows_processed(),
            total_bytes,
            chunks_processed: tracker.chunks_processed(),
            processing_time_ms: tracker.elapsed_ms(),
            pii_summary,
            average_rows_per_second: tracker.average_rows_per_second(),
            malformed_rows: reader.malformed_rows(),
            cancelled,
        };

        if !cancelled {
            state = SessionState::Completed;
        }
        info!(
            ?state,
            rows = summary.total_rows,
            chunks = summary.chunks_processed,
            pii = summary.pii_summary.total_pii_items,
            "session finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::RegexEngine;
    use crate::stream::events::NullSink;
    use std::io::Write;

    fn orchestrator() -> StreamOrchestrator {
        StreamOrchestrator::new(Arc::new(RegexEngine::new().unwrap()))
    }

    fn write_csv(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_stream_small_file_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "people.csv",
            "name,email\nJohn,john@test.com\nJane,jane@test.com\n",
        );

        let summary = orchestrator()
            .stream(&path, &StreamOptions::default(), &AtomicBool::new(false), &mut NullSink)
            .unwrap();

        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.chunks_processed, 1);
        assert_eq!(summary.pii_summary.total_pii_items, 2);
        assert!(!summary.cancelled);
        assert_eq!(summary.malformed_rows, 0);
    }

    #[test]
    fn test_max_rows_truncates_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("id,note\n");
        for i in 0..50 {
            body.push_str(&format!("{i},row number {i}\n"));
        }
        let path = write_csv(&dir, "big.csv", &body);

        let options = StreamOptions { max_rows: Some(7), ..Default::default() };
        let summary = orchestrator()
            .stream(&path, &options, &AtomicBool::new(false), &mut NullSink)
            .unwrap();

        assert_eq!(summary.total_rows, 7);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_pre_cancelled_session_delivers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "people.csv", "name\nJohn\n");

        let summary = orchestrator()
            .stream(&path, &StreamOptions::default(), &AtomicBool::new(true), &mut NullSink)
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.total_rows, 0);
        assert_eq!(summary.chunks_processed, 0);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = orchestrator()
            .stream(
                Path::new("/nonexistent/f.csv"),
                &StreamOptions::default(),
                &AtomicBool::new(false),
                &mut NullSink,
            )
            .unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }
}
