//! Observability stubs (metrics, tracing)

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_processed: AtomicU64,
    submodels_collected: AtomicU64,
    tombstones_recorded: AtomicU64,
    batches_completed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_job(&self, submodels: usize, tombstones: usize) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        self.submodels_collected
            .fetch_add(submodels as u64, Ordering::Relaxed);
        self.tombstones_recorded
            .fetch_add(tombstones as u64, Ordering::Relaxed);
    }

    pub fn record_batch_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_completed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            submodels_collected: self.submodels_collected.load(Ordering::Relaxed),
            tombstones_recorded: self.tombstones_recorded.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_processed: u64,
    pub submodels_collected: u64,
    pub tombstones_recorded: u64,
    pub batches_completed: u64,
}

/// Installs the global tracing subscriber, honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
