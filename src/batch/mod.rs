//! Batch lifecycle, persistence and orchestration
//!
//! A batch is one crawl request: a set of root identification keys resolved
//! to full part chains by a worker pool. Each processed node yields a
//! [`JobRecord`]; the batch accumulates records until every reachable node
//! within the depth limit is resolved, then settles in exactly one terminal
//! state.

mod executor;
mod store;

pub use executor::{BatchOrchestrator, CrawlRequest};
pub use store::{BatchStore, InMemoryBatchStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::delegates::ItemContainer;
use crate::model::PartChainIdentificationKey;

/// Lifecycle state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Initialized,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::Error | BatchState::Cancelled
        )
    }
}

#[derive(Debug, Error)]
#[error("illegal batch state transition from {from:?} to {to:?}")]
pub struct BatchStateError {
    pub from: BatchState,
    pub to: BatchState,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    State(#[from] BatchStateError),

    #[error("worker pool stopped while {outstanding} jobs were outstanding")]
    WorkersLost { outstanding: usize },
}

/// Result of processing one node of the part chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub key: PartChainIdentificationKey,
    /// Hops from the nearest root; roots are depth 0
    pub depth: u32,
    pub container: ItemContainer,
}

/// One crawl request and everything collected for it so far
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub state: BatchState,
    pub total_roots: usize,
    /// Every job dispatched for this batch, in dispatch order. Ids appear
    /// here as soon as the job is handed to a worker, before its record
    /// arrives, so a running batch exposes its pending work.
    pub job_ids: Vec<Uuid>,
    pub records: Vec<JobRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(total_roots: usize) -> Self {
        Self {
            id: Uuid::now_v7(),
            state: BatchState::Initialized,
            total_roots,
            job_ids: Vec::new(),
            records: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Advances the lifecycle. Legal transitions are `Initialized -> Running`
    /// and `Running` to any terminal state; terminal states never change.
    pub fn transition(&mut self, to: BatchState) -> Result<(), BatchStateError> {
        let legal = matches!(
            (self.state, to),
            (BatchState::Initialized, BatchState::Running)
                | (BatchState::Running, BatchState::Completed)
                | (BatchState::Running, BatchState::Error)
                | (BatchState::Running, BatchState::Cancelled)
        );
        if !legal {
            return Err(BatchStateError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Registers a dispatched job; its record arrives later.
    pub fn register_job(&mut self, job_id: Uuid) {
        self.job_ids.push(job_id);
    }

    pub fn add_record(&mut self, record: JobRecord) {
        self.records.push(record);
    }

    /// Jobs dispatched but not yet reported back.
    pub fn pending_job_ids(&self) -> Vec<Uuid> {
        self.job_ids
            .iter()
            .filter(|id| !self.records.iter().any(|record| record.job_id == **id))
            .copied()
            .collect()
    }

    /// All submodels collected across the batch's records.
    pub fn submodel_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.container.submodels().len())
            .sum()
    }

    /// All tombstones recorded across the batch's records.
    pub fn tombstone_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.container.tombstones().len())
            .sum()
    }
}
