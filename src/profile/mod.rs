//! System profile module
//!
//! Provides cached system information used for chunk sizing and worker
//! counts. All values are computed once on first access and cached for the
//! program lifetime.

use std::sync::{Arc, LazyLock};

/// System profile information cached for the entire program lifetime
pub static SYSTEM: LazyLock<Arc<SystemProfile>> = LazyLock::new(|| Arc::new(SystemProfile::detect()));

/// System profile containing hardware and resource information
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Total CPU cores (including hyperthreading)
    pub cpu_count: usize,

    /// Physical CPU cores (excluding hyperthreading)
    pub physical_cpu_count: usize,

    /// Total system memory in bytes
    pub total_memory: u64,

    /// Available system memory in bytes at startup
    pub available_memory: u64,
}

impl SystemProfile {
    /// Detect system profile (called once via LazyLock)
    fn detect() -> Self {
        use sysinfo::{MemoryRefreshKind, RefreshKind, System};

        let cpu_count = num_cpus::get();
        let physical_cpu_count = num_cpus::get_physical();

        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        Self {
            cpu_count,
            physical_cpu_count,
            total_memory: sys.total_memory(),
            available_memory: sys.available_memory(),
        }
    }

    /// Get the global system profile instance
    pub fn get() -> Arc<SystemProfile> {
        SYSTEM.clone()
    }

    /// Memory budget usable by one streaming session: free memory, but never
    /// more than a quarter of total memory.
    pub fn streaming_memory_budget(&self) -> u64 {
        self.available_memory.min(self.total_memory / 4)
    }

    /// Worker count for intra-chunk row scanning, capped by a percentage of
    /// available cores.
    pub fn scan_workers(&self, percentage: u8) -> usize {
        let percentage = percentage.min(100) as f32 / 100.0;
        ((self.cpu_count as f32 * percentage).ceil() as usize).max(1)
    }

    /// Get a human-readable summary of system resources
    pub fn summary(&self) -> String {
        format!(
            "System Profile: {} CPUs ({} physical), {:.2} GB RAM ({:.2} GB available)",
            self.cpu_count,
            self.physical_cpu_count,
            self.total_memory as f64 / (1024.0 * 1024.0 * 1024.0),
            self.available_memory as f64 / (1024.0 * 1024.0 * 1024.0)
        )
    }
}
