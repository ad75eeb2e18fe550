//! Chunked reading of tabular files
//!
//! A chunk is a contiguous byte range of the source file parsed into whole
//! rows. The reader carries partial trailing records over to the next read so
//! a row is never split across two chunks.

pub mod advisor;
pub mod format;
pub mod reader;

pub use reader::ChunkReader;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A scalar cell value. Delimited files produce text and nulls; sheet
/// formats carry native numbers and booleans through.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Value {
    /// The text content of this cell, when it is non-empty text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Null => serializer.serialize_none(),
        }
    }
}

/// An ordered mapping from field name to scalar value. Field order is the
/// file's column order and is preserved through scanning and masking.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { cells: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.cells.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Byte-range metadata for one chunk.
///
/// `total_chunks` is a best-effort estimate and may be revised between
/// chunks; only `is_last_chunk` is authoritative for termination.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub chunk_index: u64,
    pub start_byte: u64,
    pub end_byte: u64,
    pub total_size: u64,
    pub total_chunks: u64,
    pub is_last_chunk: bool,
}

/// One chunk's worth of fully parsed rows.
#[derive(Debug, Clone)]
pub struct FileChunk {
    pub info: ChunkInfo,
    pub rows: Vec<Row>,
}
