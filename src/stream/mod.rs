//! Streaming session core
//!
//! Ties the chunk reader and field scanner into an ordered event stream:
//! orchestration, progress accounting, memory guarding, and the event/sink
//! vocabulary shared by the CLI and the HTTP boundary.

pub mod events;
pub mod memory;
pub mod orchestrator;
pub mod progress;

pub use events::{
    ChunkEvent, ConnectedEvent, ErrorEvent, NullSink, PiiDetectedEvent, StreamEvent,
    StreamSink, StreamSummary,
};
pub use memory::{MemoryGuard, MemoryPressure, MemorySnapshot};
pub use orchestrator::{SessionState, StreamOptions, StreamOrchestrator};
pub use progress::{ProgressTracker, StreamProgress};
