//! Streaming event payloads and the sink seam
//!
//! Every event is a serde struct whose wire shape (camelCase keys, stable
//! event names) is frozen; the SSE boundary and the CLI both consume the
//! same payloads through the `StreamSink` trait.

use serde::Serialize;
use serde_json::json;

use crate::chunk::{ChunkInfo, Row};
use crate::scan::{PiiSummary, PiiType, SecurityMetrics};
use crate::stream::progress::StreamProgress;

/// First event of every session, sent before any data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    pub session_id: String,
    pub filename: String,
    pub total_bytes: u64,
    pub chunk_size: usize,
    pub estimated_chunks: u64,
}

/// One chunk of processed rows plus its security rollup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEvent {
    #[serde(flatten)]
    pub info: ChunkInfo,
    pub rows: Vec<Row>,
    pub rows_in_chunk: u64,
    pub total_rows_processed: u64,
    /// Number of PII findings in this chunk.
    pub pii_detected: u64,
    pub security_metrics: SecurityMetrics,
}

/// Emitted after a chunk event when that chunk contained PII.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiDetectedEvent {
    pub chunk_index: u64,
    /// Findings in this chunk.
    pub count: u64,
    /// Running total for the session.
    #[serde(rename = "totalPIIDetected")]
    pub total_pii_detected: u64,
    pub types: Vec<PiiType>,
}

/// Terminal failure payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
}

/// Terminal success payload, also returned by the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub total_rows: u64,
    pub total_bytes: u64,
    pub chunks_processed: u64,
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u64,
    pub pii_summary: PiiSummary,
    #[serde(rename = "averageSpeed")]
    pub average_rows_per_second: f64,
    /// Rows skipped as unparseable in lenient mode.
    pub malformed_rows: u64,
    /// True when the session stopped on a cancellation request; the totals
    /// then cover only the chunks processed before the stop.
    pub cancelled: bool,
}

/// The full event vocabulary of a streaming session.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Connected(ConnectedEvent),
    Progress(StreamProgress),
    Chunk(ChunkEvent),
    PiiDetected(PiiDetectedEvent),
    Complete(StreamSummary),
    Error(ErrorEvent),
}

impl StreamEvent {
    /// Wire name used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected(_) => "connected",
            StreamEvent::Progress(_) => "progress",
            StreamEvent::Chunk(_) => "chunk",
            StreamEvent::PiiDetected(_) => "pii-detected",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StreamEvent::Connected(e) => json!(e),
            StreamEvent::Progress(e) => json!(e),
            StreamEvent::Chunk(e) => json!(e),
            StreamEvent::PiiDetected(e) => json!(e),
            StreamEvent::Complete(e) => json!(e),
            StreamEvent::Error(e) => json!(e),
        }
    }
}

/// Consumer of in-flight session events.
///
/// The orchestrator calls these in a fixed order per chunk: progress, then
/// chunk, then pii-detected (only when the chunk had findings). Terminal
/// complete/error delivery is the boundary's job, not the sink's.
pub trait StreamSink: Send {
    fn on_connected(&mut self, event: &ConnectedEvent);
    fn on_progress(&mut self, progress: &StreamProgress);
    fn on_chunk(&mut self, event: &ChunkEvent);
    fn on_pii_detected(&mut self, event: &PiiDetectedEvent);
}

/// Sink that drops everything. Useful for estimate-only runs and tests.
pub struct NullSink;

impl StreamSink for NullSink {
    fn on_connected(&mut self, _event: &ConnectedEvent) {}
    fn on_progress(&mut self, _progress: &StreamProgress) {}
    fn on_chunk(&mut self, _event: &ChunkEvent) {}
    fn on_pii_detected(&mut self, _event: &PiiDetectedEvent) {}
}
