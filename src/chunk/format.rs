//! Tabular format detection
//!
//! Dispatches on file extension and sniffs the delimiter of character-
//! separated files from the header line.

use std::path::Path;

/// Supported tabular formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    /// Character-delimited rows (CSV, TSV, and friends), byte-range streamable.
    Delimited,
    /// Sheet-based workbook (xlsx/xls/ods), read via calamine.
    Sheet,
}

/// Detect the tabular format for a path from its extension.
pub fn detect(path: &Path) -> Option<TabularFormat> {
    let ext = path.extension().and_then(|e| e.to_str())?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "tsv" | "txt" => Some(TabularFormat::Delimited),
        "xlsx" | "xls" | "xlsb" | "ods" => Some(TabularFormat::Sheet),
        _ => None,
    }
}

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Sniff the field delimiter from the first line of a delimited file.
///
/// Counts candidate delimiters outside quoted sections and picks the most
/// frequent one. Falls back to comma when the header has no delimiter at all
/// (single-column files).
pub fn sniff_delimiter(header_line: &[u8]) -> u8 {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;

    for &byte in header_line {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        for (i, &candidate) in CANDIDATE_DELIMITERS.iter().enumerate() {
            if byte == candidate {
                counts[i] += 1;
            }
        }
    }

    let (best, &count) = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, &c)| c)
        .unwrap_or((0, &0));
    if count == 0 { b',' } else { CANDIDATE_DELIMITERS[best] }
}
