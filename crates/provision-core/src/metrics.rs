//! Process-wide provisioning counters.
//!
//! The apply engine and orchestrator bump these as they go; binaries call
//! [`Metrics::flush`] once before exiting to log the totals.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    invocations: AtomicU64,
    lookups: AtomicU64,
    creates: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub invocations: u64,
    pub lookups: u64,
    pub creates: u64,
    pub failures: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            creates: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn inc_invocations(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    /// One `lookup` call issued to the backend.
    pub fn inc_lookups(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// One `create` call issued to the backend.
    pub fn inc_creates(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    /// One node ended `Failed`, whether from the API or a failed dependency.
    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            creates: self.creates.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Log the current totals as one `info!` event.
    pub fn flush(&self) {
        let totals = self.snapshot();
        tracing::info!(
            metric = "flush",
            invocations = totals.invocations,
            lookups = totals.lookups,
            creates = totals.creates,
            failures = totals.failures,
        );
    }

    pub fn reset(&self) {
        self.invocations.store(0, Ordering::Relaxed);
        self.lookups.store(0, Ordering::Relaxed);
        self.creates.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}
