//! Advisory memory guard for streaming sessions
//!
//! Samples this process's resident memory between chunks and flags growth
//! over the session baseline. The guard never aborts a stream; it reports
//! pressure so the caller can log, shed optional work, or shrink chunks.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

const MB: u64 = 1024 * 1024;

/// Growth over baseline that triggers a warning.
pub const WARNING_GROWTH_BYTES: u64 = 400 * MB;
/// Growth over baseline considered critical.
pub const CRITICAL_GROWTH_BYTES: u64 = 500 * MB;

/// Pressure level derived from growth over the session baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    Normal,
    Warning,
    Critical,
}

/// One sample of the process's memory state.
#[derive(Debug, Clone, Copy)]
pub struct MemorySnapshot {
    pub current_bytes: u64,
    pub baseline_bytes: u64,
    pub peak_bytes: u64,
    pub pressure: MemoryPressure,
}

impl MemorySnapshot {
    pub fn growth_bytes(&self) -> u64 {
        self.current_bytes.saturating_sub(self.baseline_bytes)
    }
}

/// Tracks this process's resident memory over one streaming session.
///
/// When the current pid cannot be resolved (unusual, but possible in
/// sandboxed environments) the guard degrades to a no-op that always reports
/// normal pressure.
pub struct MemoryGuard {
    system: System,
    pid: Option<Pid>,
    baseline_bytes: u64,
    peak_bytes: u64,
}

impl MemoryGuard {
    pub fn new() -> Self {
        let mut guard = Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            baseline_bytes: 0,
            peak_bytes: 0,
        };
        let current = guard.current_memory();
        guard.baseline_bytes = current;
        guard.peak_bytes = current;
        guard
    }

    fn current_memory(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }

    /// Take a sample and classify pressure. O(1) per call; intended to run
    /// once per chunk.
    pub fn sample(&mut self) -> MemorySnapshot {
        let current = self.current_memory();
        self.peak_bytes = self.peak_bytes.max(current);

        let growth = current.saturating_sub(self.baseline_bytes);
        let pressure = if growth >= CRITICAL_GROWTH_BYTES {
            MemoryPressure::Critical
        } else if growth >= WARNING_GROWTH_BYTES {
            MemoryPressure::Warning
        } else {
            MemoryPressure::Normal
        };

        match pressure {
            MemoryPressure::Critical => warn!(
                growth_mb = growth / MB,
                current_mb = current / MB,
                "critical memory growth during stream"
            ),
            MemoryPressure::Warning => warn!(
                growth_mb = growth / MB,
                current_mb = current / MB,
                "elevated memory growth during stream"
            ),
            MemoryPressure::Normal => debug!(current_mb = current / MB, "memory sample"),
        }

        MemorySnapshot {
            current_bytes: current,
            baseline_bytes: self.baseline_bytes,
            peak_bytes: self.peak_bytes,
            pressure,
        }
    }

    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes
    }
}

impl Default for MemoryGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_normal_at_baseline() {
        let mut guard = MemoryGuard::new();
        let snapshot = guard.sample();
        assert_eq!(snapshot.pressure, MemoryPressure::Normal);
        assert!(snapshot.peak_bytes >= snapshot.baseline_bytes.min(snapshot.current_bytes));
    }

    #[test]
    fn test_peak_never_decreases() {
        let mut guard = MemoryGuard::new();
        let first = guard.sample().peak_bytes;
        let second = guard.sample().peak_bytes;
        assert!(second >= first);
    }

    #[test]
    fn test_growth_is_saturating() {
        let snapshot = MemorySnapshot {
            current_bytes: 10,
            baseline_bytes: 100,
            peak_bytes: 100,
            pressure: MemoryPressure::Normal,
        };
        assert_eq!(snapshot.growth_bytes(), 0);
    }
}
