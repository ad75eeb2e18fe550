//! `stream` command
//!
//! Runs the full pipeline against a local file. In summary mode a progress
//! bar tracks bytes and a report prints at the end; in json mode masked rows
//! go to stdout as JSON lines and the summary follows as a final JSON object.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::ProgressBar;

use crate::cli::Output;
use crate::config::CloakstreamConfig;
use crate::scan::RegexEngine;
use crate::stream::{
    ChunkEvent, ConnectedEvent, PiiDetectedEvent, StreamOptions, StreamOrchestrator,
    StreamProgress, StreamSink, StreamSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Progress bar plus a human-readable report
    Summary,
    /// Masked rows as JSON lines, then the summary as one JSON object
    Json,
}

#[derive(Args)]
pub struct StreamArgs {
    /// File to stream
    pub file: PathBuf,

    /// Chunk size in bytes (clamped to the supported range)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Stop after this many rows
    #[arg(long)]
    pub max_rows: Option<u64>,

    /// Detect PII but leave values unmasked
    #[arg(long)]
    pub preserve_pii: bool,

    /// Fail on the first malformed row instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "summary")]
    pub format: OutputFormat,
}

struct CliSink<'a> {
    output: &'a Output,
    bar: Option<ProgressBar>,
    emit_rows: bool,
    show_bar: bool,
}

impl StreamSink for CliSink<'_> {
    fn on_connected(&mut self, event: &ConnectedEvent) {
        self.output.verbose(&format!(
            "session {} started: {} bytes, {} byte chunks, ~{} chunks",
            event.session_id, event.total_bytes, event.chunk_size, event.estimated_chunks
        ));
        if self.show_bar {
            self.bar = self.output.byte_progress(event.total_bytes, &event.filename);
        }
    }

    fn on_progress(&mut self, progress: &StreamProgress) {
        if let Some(bar) = &self.bar {
            bar.set_position(progress.bytes_processed);
        }
    }

    fn on_chunk(&mut self, event: &ChunkEvent) {
        if !self.emit_rows {
            return;
        }
        for row in &event.rows {
            match serde_json::to_string(row) {
                Ok(line) => println!("{line}"),
                Err(e) => self.output.error(&format!("failed to encode row: {e}")),
            }
        }
    }

    fn on_pii_detected(&mut self, event: &PiiDetectedEvent) {
        self.output.verbose(&format!(
            "chunk {}: {} PII findings ({} total)",
            event.chunk_index, event.count, event.total_pii_detected
        ));
    }
}

pub fn execute(args: StreamArgs, config: &CloakstreamConfig, output: &Output) -> Result<()> {
    let options = StreamOptions {
        chunk_size: args.chunk_size,
        preserve_pii: args.preserve_pii || config.preserve_pii,
        mask_policy: Some(config.mask_policy),
        max_rows: args.max_rows,
        strict: args.strict || config.strict,
    };

    let engine = Arc::new(RegexEngine::new()?);
    let orchestrator = StreamOrchestrator::new(engine);
    let cancel = AtomicBool::new(false);

    let cancel_flag = register_ctrl_c();
    let mut sink = CliSink {
        output,
        bar: None,
        emit_rows: args.format == OutputFormat::Json,
        show_bar: args.format == OutputFormat::Summary,
    };

    let summary = orchestrator
        .stream(&args.file, &options, cancel_flag.as_deref().unwrap_or(&cancel), &mut sink)
        .with_context(|| format!("failed to stream {}", args.file.display()))?;

    if let Some(bar) = sink.bar.take() {
        bar.finish_and_clear();
    }
    report(&summary, args.format, output)?;
    Ok(())
}

/// Ctrl-C flips a cancel flag so the session stops at the next chunk
/// boundary and still reports what it processed.
fn register_ctrl_c() -> Option<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    let handle = tokio::runtime::Handle::try_current().ok()?;
    handle.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handler_flag.store(true, Ordering::Relaxed);
        }
    });
    Some(flag)
}

fn report(summary: &StreamSummary, format: OutputFormat, output: &Output) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(summary)?);
        }
        OutputFormat::Summary => {
            output.header("Stream summary");
            output.table_row("rows", &summary.total_rows.to_string());
            output.table_row("chunks", &summary.chunks_processed.to_string());
            output.table_row("bytes", &summary.total_bytes.to_string());
            output.table_row("time (ms)", &summary.processing_time_ms.to_string());
            output.table_row(
                "rows/sec",
                &format!("{:.0}", summary.average_rows_per_second),
            );
            output.table_row(
                "PII findings",
                &summary.pii_summary.total_pii_items.to_string(),
            );
            for (pii_type, count) in &summary.pii_summary.by_type {
                output.table_row(&format!("  {}", pii_type.as_str()), &count.to_string());
            }
            if summary.malformed_rows > 0 {
                output.warning(&format!("{} malformed rows skipped", summary.malformed_rows));
            }
            if summary.cancelled {
                output.warning("stream cancelled before completion");
            } else {
                output.success("stream complete");
            }
        }
    }
    Ok(())
}
