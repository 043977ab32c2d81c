//! Shared health state for the /health endpoint.
//! Updated by the analysis fan-out and DbWriter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared run counters. Written by pipeline components, read by the API.
#[derive(Default)]
pub struct HealthState {
    /// ASINs whose analysis finished in this process.
    pub asins_analyzed: AtomicU64,
    /// Runs committed to SQLite.
    pub runs_persisted: AtomicU64,
    /// Runs whose transaction failed.
    pub write_failures: AtomicU64,
    /// Unix seconds of the last finished analysis (0 = none).
    pub last_run_at: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_analysis(&self, at_secs: u64) {
        self.asins_analyzed.fetch_add(1, Ordering::Relaxed);
        self.last_run_at.store(at_secs, Ordering::Relaxed);
    }

    pub fn inc_runs_persisted(&self) {
        self.runs_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asins_analyzed(&self) -> u64 {
        self.asins_analyzed.load(Ordering::Relaxed)
    }

    pub fn runs_persisted(&self) -> u64 {
        self.runs_persisted.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn last_run_at(&self) -> u64 {
        self.last_run_at.load(Ordering::Relaxed)
    }
}
