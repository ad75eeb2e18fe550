//! Progress accounting for a streaming session
//!
//! Tracks processed bytes and rows across chunks and derives throughput and
//! a byte-rate ETA. Percent complete is monotonic for the session even when
//! byte accounting is approximate (sheet formats).

use std::time::Instant;

use serde::Serialize;

/// Snapshot published on every `progress` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamProgress {
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub rows_processed: u64,
    pub chunks_processed: u64,
    /// Best-effort estimate, revised as chunks arrive; never authoritative
    /// for termination.
    pub total_chunks: u64,
    /// Percent complete in [0, 100].
    pub percent_complete: f64,
    pub average_rows_per_second: f64,
    /// Byte-rate ETA in milliseconds; absent until enough throughput data
    /// exists to estimate.
    #[serde(rename = "estimatedTimeRemaining", skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_ms: Option<u64>,
}

/// Accumulates per-chunk progress for one session.
pub struct ProgressTracker {
    total_bytes: u64,
    started: Instant,
    bytes_processed: u64,
    rows_processed: u64,
    chunks_processed: u64,
    last_percent: f64,
}

impl ProgressTracker {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            started: Instant::now(),
            bytes_processed: 0,
            rows_processed: 0,
            chunks_processed: 0,
            last_percent: 0.0,
        }
    }

    /// Record a finished chunk and produce the snapshot to publish for it.
    pub fn record_chunk(
        &mut self,
        chunk_end_byte: u64,
        rows_in_chunk: u64,
        total_chunks: u64,
    ) -> StreamProgress {
        self.bytes_processed = self.bytes_processed.max(chunk_end_byte);
        self.rows_processed += rows_in_chunk;
        self.chunks_processed += 1;

        let raw_percent = if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_processed as f64 / self.total_bytes as f64) * 100.0
        };
        // Never move backwards, never overshoot.
        self.last_percent = self.last_percent.max(raw_percent.min(100.0));

        let elapsed = self.started.elapsed().as_secs_f64();
        let estimated_time_remaining_ms = if elapsed > 0.0 && self.bytes_processed > 0 {
            let bytes_per_second = self.bytes_processed as f64 / elapsed;
            let remaining = self.total_bytes.saturating_sub(self.bytes_processed);
            Some((remaining as f64 / bytes_per_second * 1000.0) as u64)
        } else {
            None
        };

        StreamProgress {
            bytes_processed: self.bytes_processed,
            total_bytes: self.total_bytes,
            rows_processed: self.rows_processed,
            chunks_processed: self.chunks_processed,
            total_chunks: total_chunks.max(self.chunks_processed),
            percent_complete: self.last_percent,
            average_rows_per_second: self.average_rows_per_second(),
            estimated_time_remaining_ms,
        }
    }

    pub fn rows_processed(&self) -> u64 {
        self.rows_processed
    }

    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Average throughput over the whole session so far.
    pub fn average_rows_per_second(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_processed as f64 / elapsed
        } else {
            0.0
        }
    }
}
