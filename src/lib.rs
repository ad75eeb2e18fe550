//! # Cloakstream - chunked file streaming with inline PII masking
//!
//! Reads large tabular files (CSV/TSV and spreadsheet formats) in bounded
//! chunks, scans every field for PII, masks what policy says to mask, and
//! delivers ordered progress, chunk, and detection events to a consumer.
//! Ships with a CLI for local runs and an HTTP boundary that streams
//! sessions as server-sent events.
//!
//! ## Quick Start
//!
//! ```bash
//! # Install cloakstream
//! cargo install cloakstream
//!
//! # Stream a file locally
//! cloakstream stream data.csv
//!
//! # Run the SSE server
//! cloakstream serve --uploads-dir ./uploads
//! ```

pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod profile;
pub mod scan;
pub mod server;
pub mod stream;

pub use cli::{Cli, Output};
pub use config::CloakstreamConfig;
pub use error::{EngineError, StreamError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
