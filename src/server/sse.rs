//! Server-sent-event streaming route
//!
//! Runs the synchronous orchestrator on a blocking worker and bridges its
//! events into the response over a bounded channel. Client disconnects drop
//! the receiver, which flips the session's cancel flag on the next send.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, warn};

use crate::server::routes::{resolve_upload, ApiError};
use crate::server::AppState;
use crate::stream::{
    ChunkEvent, ConnectedEvent, ErrorEvent, PiiDetectedEvent, StreamEvent,
    StreamOptions, StreamOrchestrator, StreamProgress, StreamSink,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Sink that forwards events into the SSE channel.
///
/// A failed send means the receiver is gone (client disconnected); the sink
/// then requests cancellation and drops everything further.
struct ChannelSink {
    tx: mpsc::Sender<Event>,
    cancel: Arc<AtomicBool>,
}

impl ChannelSink {
    fn send(&self, event: StreamEvent) {
        let sse_event = match Event::default().event(event.name()).json_data(event.to_json()) {
            Ok(sse_event) => sse_event,
            Err(e) => {
                error!("failed to encode {} event: {e}", event.name());
                return;
            }
        };
        if self.tx.blocking_send(sse_event).is_err() {
            debug!("event channel closed, requesting cancellation");
            self.cancel.store(true, Ordering::Relaxed);
        }
    }
}

impl StreamSink for ChannelSink {
    fn on_connected(&mut self, event: &ConnectedEvent) {
        self.send(StreamEvent::Connected(event.clone()));
    }

    fn on_progress(&mut self, progress: &StreamProgress) {
        self.send(StreamEvent::Progress(progress.clone()));
    }

    fn on_chunk(&mut self, event: &ChunkEvent) {
        self.send(StreamEvent::Chunk(event.clone()));
    }

    fn on_pii_detected(&mut self, event: &PiiDetectedEvent) {
        self.send(StreamEvent::PiiDetected(event.clone()));
    }
}

/// POST /api/stream/{filename}
///
/// Emits `connected`, then per chunk `progress`/`chunk`/`pii_detected`, and
/// always ends with exactly one `complete` or `error` frame. Cancelled
/// sessions still end with `complete` (flagged in the summary) when the
/// client is around to read it.
pub async fn stream_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    options: Option<Json<StreamOptions>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let path = resolve_upload(&state.config.uploads_dir, &filename)?;
    let mut options = options.map(|Json(o)| o).unwrap_or_default();
    options.strict = options.strict || state.config.strict;
    options.preserve_pii = options.preserve_pii || state.config.preserve_pii;
    if options.mask_policy.is_none() {
        options.mask_policy = Some(state.config.mask_policy);
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = Arc::new(AtomicBool::new(false));
    let engine = state.engine.clone();

    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink { tx: tx.clone(), cancel: cancel.clone() };
        let orchestrator = StreamOrchestrator::new(engine);
        let terminal = match orchestrator.stream(&path, &options, &cancel, &mut sink) {
            Ok(summary) => StreamEvent::Complete(summary),
            Err(e) => {
                warn!(code = e.code(), "stream failed: {e}");
                StreamEvent::Error(ErrorEvent {
                    code: e.code().to_string(),
                    message: e.to_string(),
                })
            }
        };
        sink.send(terminal);
    });

    let stream = ReceiverStream::new(rx).map(Ok);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
