//! Chunked file reader
//!
//! Responsibilities:
//! - Own the file handle exclusively for one streaming session
//! - Read byte-range chunks and parse them into whole rows
//! - Carry partial trailing records over to the next chunk read
//! - Count or abort on malformed rows depending on strict mode
//!
//! Delimited files (CSV/TSV) are true constant-memory byte streams. Sheet
//! formats cannot be byte-range streamed, so they are loaded via calamine and
//! chunked by row batches with best-effort byte accounting.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::mem;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader as CalamineReader};
use tracing::{debug, warn};

use crate::chunk::format::{self, TabularFormat};
use crate::chunk::{ChunkInfo, FileChunk, Row, Value};
use crate::error::{Result, StreamError};

/// Reads a tabular file as a sequence of whole-row chunks.
#[derive(Debug)]
pub struct ChunkReader {
    path: PathBuf,
    total_size: u64,
    strict: bool,
    chunk_index: u64,
    malformed_rows: u64,
    inner: ReaderKind,
}

#[derive(Debug)]
enum ReaderKind {
    Delimited(DelimitedState),
    Sheet(SheetState),
}

#[derive(Debug)]
struct DelimitedState {
    file: File,
    /// Bytes after the last complete record of the previous read, prepended
    /// to the next read before parsing.
    carry: Vec<u8>,
    headers: Option<Vec<String>>,
    delimiter: Option<u8>,
    /// Logical file position of all bytes already parsed into rows.
    bytes_consumed: u64,
    records_seen: u64,
    eof: bool,
}

#[derive(Debug)]
struct SheetState {
    rows: VecDeque<Row>,
    total_rows: u64,
    rows_emitted: u64,
}

impl ChunkReader {
    /// Open a tabular file for chunked reading.
    ///
    /// Fails with `StreamError::NotFound` when the path does not exist and
    /// `StreamError::UnsupportedFormat` when the extension is not a known
    /// tabular format.
    pub fn open(path: &Path, strict: bool) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StreamError::NotFound(path.display().to_string()),
            _ => StreamError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(StreamError::NotFound(path.display().to_string()));
        }
        let total_size = metadata.len();

        let format = format::detect(path)
            .ok_or_else(|| StreamError::UnsupportedFormat(path.display().to_string()))?;

        let inner = match format {
            TabularFormat::Delimited => ReaderKind::Delimited(DelimitedState {
                file: File::open(path)?,
                carry: Vec::new(),
                headers: None,
                delimiter: None,
                bytes_consumed: 0,
                records_seen: 0,
                eof: false,
            }),
            TabularFormat::Sheet => ReaderKind::Sheet(SheetState::load(path)?),
        };

        debug!(path = %path.display(), total_size, ?format, "opened file for chunked streaming");

        Ok(Self {
            path: path.to_path_buf(),
            total_size,
            strict,
            chunk_index: 0,
            malformed_rows: 0,
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Rows skipped due to parse failures (non-strict mode only).
    pub fn malformed_rows(&self) -> u64 {
        self.malformed_rows
    }

    /// Read the next chunk. `Ok(None)` means end of file.
    pub fn read_chunk(&mut self, chunk_size: u64) -> Result<Option<FileChunk>> {
        match &mut self.inner {
            ReaderKind::Delimited(_) => self.read_delimited(chunk_size),
            ReaderKind::Sheet(_) => Ok(self.read_sheet(chunk_size)),
        }
    }

    fn read_delimited(&mut self, chunk_size: u64) -> Result<Option<FileChunk>> {
        let strict = self.strict;
        let total_size = self.total_size;
        let st = match &mut self.inner {
            ReaderKind::Delimited(st) => st,
            ReaderKind::Sheet(_) => unreachable!(),
        };

        let chunk_start = st.bytes_consumed;
        let mut rows = Vec::new();
        let mut malformed = 0u64;

        loop {
            if st.eof && st.carry.is_empty() {
                break;
            }

            let mut buf = mem::take(&mut st.carry);
            if !st.eof {
                let prior = buf.len();
                buf.resize(prior + chunk_size as usize, 0);
                let mut filled = prior;
                while filled < buf.len() {
                    let n = st.file.read(&mut buf[filled..])?;
                    if n == 0 {
                        st.eof = true;
                        break;
                    }
                    filled += n;
                }
                buf.truncate(filled);
                // A read that fills the buffer exactly at end of file never
                // observes the zero-byte read; the byte accounting still
                // identifies it. `bytes_consumed + buf.len()` is the total
                // read from the file so far (carry bytes are unparsed).
                if st.bytes_consumed + buf.len() as u64 >= total_size {
                    st.eof = true;
                }
            }

            // Everything up to the last record boundary is parseable now; the
            // tail is carried into the next read so no row is ever split.
            let split = if st.eof {
                buf.len()
            } else {
                match last_unquoted_newline(&buf) {
                    Some(pos) => pos + 1,
                    None => {
                        // No complete record yet; keep accumulating.
                        st.carry = buf;
                        continue;
                    }
                }
            };
            st.carry = buf.split_off(split);
            let complete = buf;
            if complete.is_empty() {
                continue;
            }
            st.bytes_consumed += complete.len() as u64;

            if st.delimiter.is_none() {
                let header_end =
                    complete.iter().position(|&b| b == b'\n').unwrap_or(complete.len());
                st.delimiter = Some(format::sniff_delimiter(&complete[..header_end]));
            }

            let mut reader = csv::ReaderBuilder::new()
                .delimiter(st.delimiter.unwrap_or(b','))
                .has_headers(false)
                .flexible(true)
                .from_reader(complete.as_slice());
            let mut record = csv::ByteRecord::new();

            loop {
                match reader.read_byte_record(&mut record) {
                    Ok(false) => break,
                    Ok(true) => {
                        st.records_seen += 1;
                        if st.headers.is_none() {
                            st.headers = Some(header_names(&record));
                            continue;
                        }
                        match record_to_row(st.headers.as_ref().unwrap(), &record) {
                            Ok(row) => rows.push(row),
                            Err(reason) => {
                                if strict {
                                    return Err(StreamError::MalformedData {
                                        record: st.records_seen,
                                        reason,
                                    });
                                }
                                warn!(record = st.records_seen, %reason, "skipping malformed row");
                                malformed += 1;
                            }
                        }
                    }
                    Err(e) => {
                        if strict {
                            return Err(StreamError::MalformedData {
                                record: st.records_seen + 1,
                                reason: e.to_string(),
                            });
                        }
                        warn!(error = %e, "csv parse error, skipping remainder of span");
                        malformed += 1;
                        break;
                    }
                }
            }

            if !rows.is_empty() {
                break;
            }
            // Header-only span so far; keep reading until we have data rows
            // or hit end of file.
        }

        self.malformed_rows += malformed;

        if rows.is_empty() {
            return Ok(None);
        }

        let (eof, carry_empty, end_byte) = match &self.inner {
            ReaderKind::Delimited(st) => (st.eof, st.carry.is_empty(), st.bytes_consumed),
            ReaderKind::Sheet(_) => unreachable!(),
        };
        let info = self.next_chunk_info(chunk_start, end_byte, eof && carry_empty);
        Ok(Some(FileChunk { info, rows }))
    }

    fn read_sheet(&mut self, chunk_size: u64) -> Option<FileChunk> {
        let total_size = self.total_size;
        let st = match &mut self.inner {
            ReaderKind::Sheet(st) => st,
            ReaderKind::Delimited(_) => unreachable!(),
        };

        if st.rows.is_empty() {
            return None;
        }

        let est_row_bytes = (total_size / st.total_rows.max(1)).max(1);
        let rows_per_chunk = ((chunk_size / est_row_bytes).max(1) as usize).min(st.rows.len());
        let rows: Vec<Row> = st.rows.drain(..rows_per_chunk).collect();

        let start_byte = total_size * st.rows_emitted / st.total_rows.max(1);
        st.rows_emitted += rows.len() as u64;
        let end_byte = if st.rows.is_empty() {
            total_size
        } else {
            total_size * st.rows_emitted / st.total_rows.max(1)
        };
        let end_byte = end_byte.max(start_byte + 1);
        let is_last = match &self.inner {
            ReaderKind::Sheet(st) => st.rows.is_empty(),
            ReaderKind::Delimited(_) => unreachable!(),
        };

        let info = self.next_chunk_info(start_byte, end_byte, is_last);
        Some(FileChunk { info, rows })
    }

    fn next_chunk_info(&mut self, start_byte: u64, end_byte: u64, is_last_chunk: bool) -> ChunkInfo {
        let chunk_index = self.chunk_index;
        self.chunk_index += 1;

        // Revise the chunk-count estimate from observed bytes per chunk.
        let emitted = self.chunk_index;
        let total_chunks = if is_last_chunk || end_byte >= self.total_size {
            emitted
        } else {
            let avg = (end_byte / emitted).max(1);
            emitted + (self.total_size - end_byte).div_ceil(avg)
        };

        ChunkInfo {
            chunk_index,
            start_byte,
            end_byte,
            total_size: self.total_size,
            total_chunks,
            is_last_chunk,
        }
    }
}

impl SheetState {
    fn load(path: &Path) -> Result<SheetState> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| StreamError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| StreamError::UnsupportedFormat("workbook has no sheets".into()))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| StreamError::Internal(format!("failed to read sheet: {}", e)))?;

        let mut sheet_rows = range.rows();
        let headers: Vec<String> = match sheet_rows.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let name = cell.to_string();
                    let name = name.trim();
                    if name.is_empty() { format!("column_{}", i + 1) } else { name.to_string() }
                })
                .collect(),
            None => Vec::new(),
        };

        let mut rows = VecDeque::new();
        for sheet_row in sheet_rows {
            let mut row = Row::with_capacity(headers.len());
            for (i, cell) in sheet_row.iter().enumerate() {
                let name = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i + 1));
                row.push(name, sheet_value(cell));
            }
            rows.push_back(row);
        }

        let total_rows = rows.len() as u64;
        Ok(SheetState { rows, total_rows, rows_emitted: 0 })
    }
}

fn sheet_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        // Serial datetimes render through Data's Display.
        Data::DateTime(_) => Value::Text(cell.to_string()),
        Data::Error(_) => Value::Null,
    }
}

fn header_names(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .enumerate()
        .map(|(i, cell)| match std::str::from_utf8(cell) {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => format!("column_{}", i + 1),
        })
        .collect()
}

fn record_to_row(headers: &[String], record: &csv::ByteRecord) -> std::result::Result<Row, String> {
    let mut row = Row::with_capacity(headers.len().max(record.len()));
    for i in 0..headers.len().max(record.len()) {
        let name = headers
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("column_{}", i + 1));
        let value = match record.get(i) {
            None => Value::Null,
            Some(cell) => {
                let text = std::str::from_utf8(cell)
                    .map_err(|_| format!("invalid UTF-8 in field '{}'", name))?;
                if text.is_empty() { Value::Null } else { Value::Text(text.to_string()) }
            }
        };
        row.push(name, value);
    }
    Ok(row)
}

/// Position of the last newline that is not inside a quoted field.
///
/// Quote state is tracked from the start of the buffer, which is always a
/// record boundary because the carry buffer only ever holds record prefixes.
fn last_unquoted_newline(buf: &[u8]) -> Option<usize> {
    let mut in_quotes = false;
    let mut last = None;
    for (i, &byte) in buf.iter().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => last = Some(i),
            _ => {}
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn read_all(reader: &mut ChunkReader, chunk_size: u64) -> Vec<FileChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.read_chunk(chunk_size).unwrap() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn test_open_missing_file() {
        let err = ChunkReader::open(Path::new("/no/such/file.csv"), false).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_open_unknown_extension() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(b"a,b\n1,2\n").unwrap();
        let err = ChunkReader::open(file.path(), false).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_single_chunk_read() {
        let file = csv_file("name,email\nJohn,john@x.com\nJane,jane@y.com\n");
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        let chunks = read_all(&mut reader, 1024 * 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].rows.len(), 2);
        assert!(chunks[0].info.is_last_chunk);
        assert_eq!(chunks[0].info.chunk_index, 0);
        assert_eq!(chunks[0].info.end_byte, reader.total_size());
        assert_eq!(
            chunks[0].rows[0].get("email"),
            Some(&Value::Text("john@x.com".into()))
        );
    }

    #[test]
    fn test_rows_never_split_across_chunks() {
        let mut content = String::from("id,email\n");
        for i in 0..200 {
            content.push_str(&format!("{},user{}@example.com\n", i, i));
        }
        let file = csv_file(&content);

        let mut single = ChunkReader::open(file.path(), false).unwrap();
        let whole: Vec<Row> =
            read_all(&mut single, 1024 * 1024).into_iter().flat_map(|c| c.rows).collect();
        assert_eq!(whole.len(), 200);

        // Tiny chunk sizes force carry-over on nearly every read.
        for chunk_size in [16u64, 31, 64, 100, 257, 1000] {
            let mut reader = ChunkReader::open(file.path(), false).unwrap();
            let chunks = read_all(&mut reader, chunk_size);
            let rows: Vec<Row> = chunks.iter().flat_map(|c| c.rows.clone()).collect();
            assert_eq!(rows, whole, "chunk_size {}", chunk_size);

            // Chunk byte ranges are contiguous and ordered.
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].info.end_byte, pair[1].info.start_byte);
                assert_eq!(pair[0].info.chunk_index + 1, pair[1].info.chunk_index);
            }
            assert!(chunks.last().unwrap().info.is_last_chunk);
            assert_eq!(chunks.last().unwrap().info.end_byte, reader.total_size());
        }
    }

    #[test]
    fn test_last_chunk_flagged_when_file_is_exact_multiple_of_chunk_size() {
        // 8-byte file read with an 8-byte chunk: the single read fills the
        // buffer exactly, so end of file must come from byte accounting.
        let file = csv_file("a,b\n1,2\n");
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        assert_eq!(reader.total_size(), 8);

        let chunk = reader.read_chunk(8).unwrap().unwrap();
        assert!(chunk.info.is_last_chunk);
        assert_eq!(chunk.info.end_byte, reader.total_size());
        assert_eq!(chunk.rows.len(), 1);
        assert!(reader.read_chunk(8).unwrap().is_none());
    }

    #[test]
    fn test_exact_multiple_flags_final_chunk_across_reads() {
        // 16 bytes over two 8-byte reads, both filling exactly.
        let file = csv_file("a,b\n1,2\n3,4\n5,6\n");
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        let chunks = read_all(&mut reader, 8);
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].info.is_last_chunk);
        assert!(chunks[1].info.is_last_chunk);
        assert_eq!(chunks[1].info.end_byte, reader.total_size());
    }

    #[test]
    fn test_quoted_newline_inside_field() {
        let file = csv_file("name,notes\nJohn,\"line one\nline two\"\nJane,ok\n");
        for chunk_size in [8u64, 24, 1024] {
            let mut reader = ChunkReader::open(file.path(), false).unwrap();
            let rows: Vec<Row> =
                read_all(&mut reader, chunk_size).into_iter().flat_map(|c| c.rows).collect();
            assert_eq!(rows.len(), 2, "chunk_size {}", chunk_size);
            assert_eq!(rows[0].get("notes"), Some(&Value::Text("line one\nline two".into())));
        }
    }

    #[test]
    fn test_delimiter_autodetection() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        file.write_all(b"name\temail\nJohn\tjohn@x.com\n").unwrap();
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        let rows: Vec<Row> =
            read_all(&mut reader, 1024).into_iter().flat_map(|c| c.rows).collect();
        assert_eq!(rows[0].get("email"), Some(&Value::Text("john@x.com".into())));

        let file = csv_file("name;email\nJohn;john@x.com\n");
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        let rows: Vec<Row> =
            read_all(&mut reader, 1024).into_iter().flat_map(|c| c.rows).collect();
        assert_eq!(rows[0].get("email"), Some(&Value::Text("john@x.com".into())));
    }

    #[test]
    fn test_short_row_padded_with_nulls() {
        let file = csv_file("a,b,c\n1,2\n");
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        let rows: Vec<Row> =
            read_all(&mut reader, 1024).into_iter().flat_map(|c| c.rows).collect();
        assert_eq!(rows[0].get("c"), Some(&Value::Null));
    }

    #[test]
    fn test_malformed_row_skipped_by_default() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"name,email\nJohn,john@x.com\nBad,\xff\xfe\nJane,jane@y.com\n")
            .unwrap();
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        let rows: Vec<Row> =
            read_all(&mut reader, 1024 * 1024).into_iter().flat_map(|c| c.rows).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(reader.malformed_rows(), 1);
    }

    #[test]
    fn test_malformed_row_fatal_in_strict_mode() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"name,email\nBad,\xff\xfe\n").unwrap();
        let mut reader = ChunkReader::open(file.path(), true).unwrap();
        let err = reader.read_chunk(1024 * 1024).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_DATA");
    }

    #[test]
    fn test_header_only_file_yields_no_chunks() {
        let file = csv_file("name,email\n");
        let mut reader = ChunkReader::open(file.path(), false).unwrap();
        assert!(reader.read_chunk(1024).unwrap().is_none());
    }

    #[test]
    fn test_sheet_value_mapping() {
        assert_eq!(sheet_value(&Data::Empty), Value::Null);
        assert_eq!(sheet_value(&Data::String("x".into())), Value::Text("x".into()));
        assert_eq!(sheet_value(&Data::Float(1.5)), Value::Number(1.5));
        assert_eq!(sheet_value(&Data::Int(3)), Value::Number(3.0));
        assert_eq!(sheet_value(&Data::Bool(true)), Value::Bool(true));
    }
}
