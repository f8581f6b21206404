//! Asynchronous polling for long-running remote transfers
//!
//! A stage that issues a remote call that does not complete synchronously
//! builds a [`PollingJob`] through [`PollingService::create_job`] and awaits
//! its [`JobHandle`]. The job probes a status-check function on a fixed
//! interval without blocking a worker thread, and resolves to exactly one
//! terminal [`PollOutcome`].
//!
//! Elapsed time is measured through the injected [`Clock`], never wall-clock
//! directly, so timeout behavior is deterministic under test (see
//! [`ManualClock`]).

mod job;

pub use job::{JobHandle, JobSpecError, PollOutcome, PollState, PollingJob, PollingJobBuilder};

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::TimeDelta::from_std(by).unwrap_or(chrono::TimeDelta::zero());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hands out polling job builders bound to one clock
#[derive(Clone)]
pub struct PollingService {
    clock: Arc<dyn Clock>,
}

impl PollingService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn create_job<T: Send + 'static>(&self) -> PollingJobBuilder<T> {
        PollingJobBuilder::new(Arc::clone(&self.clock))
    }
}
