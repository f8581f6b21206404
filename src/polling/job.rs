use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Clock;

/// Result of one status probe
#[derive(Debug, Clone)]
pub enum PollState<T> {
    Pending,
    Complete(T),
    Failed(String),
}

/// The single terminal outcome of a polling job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Complete(T),
    Failed(String),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum JobSpecError {
    #[error("polling job has no status check")]
    MissingStatusCheck,

    #[error("poll interval must be non-zero")]
    ZeroInterval,

    #[error("maximum wait must be non-zero")]
    ZeroTimeout,
}

type StatusCheck<T> =
    Box<dyn FnMut() -> Pin<Box<dyn Future<Output = PollState<T>> + Send>> + Send>;

/// Builder returned by `PollingService::create_job()`
pub struct PollingJobBuilder<T> {
    clock: Arc<dyn Clock>,
    description: String,
    status_check: Option<StatusCheck<T>>,
    poll_interval: Duration,
    max_wait: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: Send + 'static> PollingJobBuilder<T> {
    pub(super) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            description: String::new(),
            status_check: None,
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(60),
            cancel: None,
        }
    }

    /// Short label used in log lines for this job
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Function probed on every tick; `Pending` reschedules the job
    pub fn status_check(mut self, status_check: StatusCheck<T>) -> Self {
        self.status_check = Some(status_check);
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Maximum total wait before the job synthesizes a timeout
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Flag checked on each tick; when set the job terminates `Cancelled`
    pub fn cancelled_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<PollingJob<T>, JobSpecError> {
        let status_check = self.status_check.ok_or(JobSpecError::MissingStatusCheck)?;
        if self.poll_interval.is_zero() {
            return Err(JobSpecError::ZeroInterval);
        }
        if self.max_wait.is_zero() {
            return Err(JobSpecError::ZeroTimeout);
        }
        Ok(PollingJob {
            clock: self.clock,
            description: self.description,
            status_check,
            poll_interval: self.poll_interval,
            max_wait: self.max_wait,
            cancel: self.cancel,
        })
    }
}

/// Self-contained asynchronous polling task.
///
/// `spawn()` probes the status check immediately, then reschedules itself on
/// the poll interval while pending. It terminates on the first `Complete` or
/// `Failed` probe, when the injected clock reports the maximum wait exceeded,
/// or when the cancellation flag is observed set. Exactly one terminal
/// outcome is delivered; afterwards the task holds no further scheduled work.
pub struct PollingJob<T> {
    clock: Arc<dyn Clock>,
    description: String,
    status_check: StatusCheck<T>,
    poll_interval: Duration,
    max_wait: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: Send + 'static> PollingJob<T> {
    pub fn spawn(mut self) -> JobHandle<T> {
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let started = self.clock.now();
            let max_wait = chrono::TimeDelta::from_std(self.max_wait)
                .unwrap_or(chrono::TimeDelta::MAX);
            let mut ticks: u32 = 0;

            let outcome = loop {
                if self
                    .cancel
                    .as_ref()
                    .is_some_and(|flag| flag.load(Ordering::Relaxed))
                {
                    debug!(job = %self.description, ticks, "Polling job cancelled");
                    break PollOutcome::Cancelled;
                }

                ticks += 1;
                match (self.status_check)().await {
                    PollState::Complete(value) => {
                        debug!(job = %self.description, ticks, "Polling job complete");
                        break PollOutcome::Complete(value);
                    }
                    PollState::Failed(error) => {
                        debug!(job = %self.description, ticks, %error, "Polling job failed");
                        break PollOutcome::Failed(error);
                    }
                    PollState::Pending => {
                        let elapsed = self.clock.now().signed_duration_since(started);
                        if elapsed >= max_wait {
                            debug!(job = %self.description, ticks, "Polling job timed out");
                            break PollOutcome::TimedOut;
                        }
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            };

            // Receiver may be gone; the outcome is then simply dropped.
            let _ = tx.send(outcome);
        });

        JobHandle { rx, task }
    }
}

/// Completion signal of a spawned polling job
pub struct JobHandle<T> {
    rx: oneshot::Receiver<PollOutcome<T>>,
    task: JoinHandle<()>,
}

impl<T> JobHandle<T> {
    /// Awaits the job's single terminal outcome.
    pub async fn outcome(self) -> PollOutcome<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => PollOutcome::Failed("polling task stopped unexpectedly".to_string()),
        }
    }

    /// Stops the job without delivering an outcome.
    pub fn abort(&self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::{ManualClock, PollingService};
    use std::sync::atomic::AtomicUsize;

    fn service_with_manual_clock() -> (PollingService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (PollingService::new(clock.clone()), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_pending_probes() {
        let (service, _clock) = service_with_manual_clock();
        let probes = Arc::new(AtomicUsize::new(0));
        let probes_in_check = probes.clone();

        let job = service
            .create_job::<u32>()
            .description("transfer abc")
            .status_check(Box::new(move || {
                let n = probes_in_check.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if n < 2 {
                        PollState::Pending
                    } else {
                        PollState::Complete(42)
                    }
                })
            }))
            .poll_interval(Duration::from_millis(50))
            .max_wait(Duration::from_secs(10))
            .build()
            .unwrap();

        let outcome = job.spawn().outcome().await;
        assert_eq!(outcome, PollOutcome::Complete(42));
        assert_eq!(probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_exactly_once_and_stops_probing() {
        let (service, clock) = service_with_manual_clock();
        let probes = Arc::new(AtomicUsize::new(0));
        let probes_in_check = probes.clone();
        let clock_in_check = clock.clone();

        let job = service
            .create_job::<u32>()
            .description("never completes")
            .status_check(Box::new(move || {
                probes_in_check.fetch_add(1, Ordering::SeqCst);
                clock_in_check.advance(Duration::from_millis(60));
                Box::pin(async { PollState::Pending })
            }))
            .poll_interval(Duration::from_millis(50))
            .max_wait(Duration::from_millis(200))
            .build()
            .unwrap();

        let outcome = job.spawn().outcome().await;
        assert_eq!(outcome, PollOutcome::TimedOut);

        // 60ms per probe against a 200ms budget: four probes, then timeout.
        let probes_at_timeout = probes.load(Ordering::SeqCst);
        assert_eq!(probes_at_timeout, 4);

        // No further checks are scheduled after the terminal outcome.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(probes.load(Ordering::SeqCst), probes_at_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_propagates() {
        let (service, _clock) = service_with_manual_clock();

        let job = service
            .create_job::<u32>()
            .status_check(Box::new(|| {
                Box::pin(async { PollState::Failed("remote transfer aborted".to_string()) })
            }))
            .poll_interval(Duration::from_millis(10))
            .max_wait(Duration::from_secs(1))
            .build()
            .unwrap();

        let outcome = job.spawn().outcome().await;
        assert_eq!(
            outcome,
            PollOutcome::Failed("remote transfer aborted".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_beats_timeout() {
        let (service, _clock) = service_with_manual_clock();
        let cancel = Arc::new(AtomicBool::new(true));
        let probes = Arc::new(AtomicUsize::new(0));
        let probes_in_check = probes.clone();

        let job = service
            .create_job::<u32>()
            .status_check(Box::new(move || {
                probes_in_check.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { PollState::Pending })
            }))
            .poll_interval(Duration::from_millis(10))
            .max_wait(Duration::from_secs(1))
            .cancelled_flag(cancel)
            .build()
            .unwrap();

        let outcome = job.spawn().outcome().await;
        assert_eq!(outcome, PollOutcome::Cancelled);
        // Flag is checked before the first probe.
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_build_requires_status_check() {
        let (service, _clock) = service_with_manual_clock();
        let result = service.create_job::<u32>().build();
        assert!(matches!(result, Err(JobSpecError::MissingStatusCheck)));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_interval() {
        let (service, _clock) = service_with_manual_clock();
        let result = service
            .create_job::<u32>()
            .status_check(Box::new(|| Box::pin(async { PollState::Pending })))
            .poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(JobSpecError::ZeroInterval)));
    }
}
