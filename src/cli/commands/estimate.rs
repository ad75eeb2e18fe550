//! `estimate` command
//!
//! Prints the chunk sizing the advisor would pick for a file, without
//! reading any of its data.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::chunk::advisor::{self, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::cli::Output;
use crate::profile::SystemProfile;

#[derive(Args)]
pub struct EstimateArgs {
    /// File to size
    pub file: PathBuf,
}

pub fn execute(args: EstimateArgs, output: &Output) -> Result<()> {
    let file_size = std::fs::metadata(&args.file)
        .with_context(|| format!("failed to stat {}", args.file.display()))?
        .len();

    let profile = SystemProfile::get();
    let budget = profile.streaming_memory_budget();
    let chunk_size = advisor::recommend(file_size, budget);
    let chunks = advisor::estimate_chunks(file_size, chunk_size);

    output.header("Chunk sizing");
    output.table_row("file", &args.file.display().to_string());
    output.table_row("file size", &format!("{file_size} bytes"));
    output.table_row("recommended chunk", &format!("{chunk_size} bytes"));
    output.table_row("estimated chunks", &chunks.to_string());
    output.table_row("bounds", &format!("{MIN_CHUNK_SIZE}..{MAX_CHUNK_SIZE} bytes"));
    output.table_row("memory budget", &format!("{budget} bytes"));
    output.verbose(&profile.summary());
    Ok(())
}
