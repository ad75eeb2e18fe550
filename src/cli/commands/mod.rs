//! Command implementations
//!
//! One module per CLI command.

pub mod estimate;
pub mod serve;
pub mod stream;
