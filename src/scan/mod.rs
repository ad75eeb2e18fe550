//! PII scanning and masking
//!
//! The engine seam (`PiiEngine`) isolates detection/masking from the
//! streaming core; `FieldScanner` applies an engine to parsed rows under a
//! mask policy.

pub mod engine;
pub mod field;
pub mod types;

pub use engine::{Detection, PiiEngine, RegexEngine};
pub use field::{FieldScanner, ScannedChunk};
pub use types::{MaskPolicy, PiiFinding, PiiSummary, PiiType, SecurityMetrics};
