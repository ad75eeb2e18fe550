//! Error taxonomy for the streaming pipeline
//!
//! Fatal errors (file not found, strict-mode parse failures, I/O) carry a
//! stable machine-readable code that survives to the terminal SSE `error`
//! frame. Per-field detection/masking failures are `EngineError` values that
//! are swallowed at the field site and never reach this type.

use thiserror::Error;

/// Fatal, session-terminating errors.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("malformed row at record {record}: {reason}")]
    MalformedData { record: u64, reason: String },

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream error: {0}")]
    Internal(String),
}

impl StreamError {
    /// Stable code reported on the wire and in logs.
    pub fn code(&self) -> &'static str {
        match self {
            StreamError::NotFound(_) => "FILE_NOT_FOUND",
            StreamError::MalformedData { .. } => "MALFORMED_DATA",
            StreamError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            StreamError::Io(_) => "IO_ERROR",
            StreamError::Internal(_) => "STREAM_ERROR",
        }
    }
}

/// Non-fatal failures from the external PII capability. One field's failure
/// never contaminates another field, a row, or the session.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detection failed: {0}")]
    Detection(String),

    #[error("masking failed: {0}")]
    Masking(String),
}

/// Crate-wide result type for the streaming core.
pub type Result<T> = std::result::Result<T, StreamError>;
