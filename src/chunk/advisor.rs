//! Chunk size recommendation
//!
//! Pure sizing logic: no I/O, deterministic for a given file size and memory
//! budget. Callers query `profile::SystemProfile` once per session and pass
//! the budget in.

use serde::Serialize;

/// Hard lower bound for a chunk read (8 KiB).
pub const MIN_CHUNK_SIZE: u64 = 8 * 1024;

/// Hard upper bound for a chunk read (4 MiB).
pub const MAX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Default chunk size when the caller requests nothing (256 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 256 * 1024;

/// Outcome of clamping a caller-requested chunk size.
#[derive(Debug, Clone, Serialize)]
pub struct ClampedSize {
    pub chunk_size: u64,
    /// Present when the request was outside [MIN, MAX] and had to be adjusted.
    pub warning: Option<String>,
}

/// Clamp a requested chunk size into the supported range. Out-of-range
/// requests are adjusted to the nearest bound, never rejected.
pub fn clamp_requested(requested: u64) -> ClampedSize {
    if requested < MIN_CHUNK_SIZE {
        ClampedSize {
            chunk_size: MIN_CHUNK_SIZE,
            warning: Some(format!(
                "requested chunk size {} below minimum, using {} bytes",
                requested, MIN_CHUNK_SIZE
            )),
        }
    } else if requested > MAX_CHUNK_SIZE {
        ClampedSize {
            chunk_size: MAX_CHUNK_SIZE,
            warning: Some(format!(
                "requested chunk size {} above maximum, using {} bytes",
                requested, MAX_CHUNK_SIZE
            )),
        }
    } else {
        ClampedSize { chunk_size: requested, warning: None }
    }
}

/// Recommend a chunk size for a file, given the session memory budget.
///
/// Larger files get proportionally smaller slices of themselves per chunk so
/// that chunk counts stay manageable, and no chunk may exceed a tenth of the
/// memory budget.
pub fn recommend(file_size: u64, memory_budget: u64) -> u64 {
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * MB;

    let target = if file_size < 100 * MB {
        file_size / 10
    } else if file_size < GB {
        file_size / 50
    } else {
        file_size / 100
    };

    let memory_cap = memory_budget / 10;

    target.min(MAX_CHUNK_SIZE).min(memory_cap.max(MIN_CHUNK_SIZE)).max(MIN_CHUNK_SIZE)
}

/// Best-effort estimate of how many chunks a file will produce.
pub fn estimate_chunks(file_size: u64, chunk_size: u64) -> u64 {
    if file_size == 0 {
        return 1;
    }
    file_size.div_ceil(chunk_size.max(1))
}
