use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::BatchStore;
use super::{Batch, BatchError, BatchState, JobRecord};
use crate::delegates::{
    AasTransferProcess, DelegateChain, ItemContainer, TraversalParameters,
};
use crate::model::{PartChainIdentificationKey, ProcessStep, Tombstone};
use crate::observability::Metrics;

/// One crawl: root keys plus the traversal policy applied to every node
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub roots: Vec<PartChainIdentificationKey>,
    pub parameters: TraversalParameters,
}

struct JobAssignment {
    job_id: Uuid,
    key: PartChainIdentificationKey,
    depth: u32,
}

/// Drives one batch at a time through a worker pool.
///
/// Nodes are distributed round-robin over bounded per-worker channels; each
/// worker runs the delegate chain and reports a [`JobRecord`] back to the
/// collector, which merges records into the batch, persists a snapshot after
/// every record and re-dispatches newly discovered children while the depth
/// limit allows. A node's global asset id is visited at most once per batch.
pub struct BatchOrchestrator {
    store: Arc<dyn BatchStore>,
    chain: Arc<DelegateChain>,
    metrics: Arc<Metrics>,
    workers: usize,
    channel_size: usize,
    cancellations: RwLock<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn BatchStore>,
        chain: Arc<DelegateChain>,
        metrics: Arc<Metrics>,
        workers: usize,
        channel_size: usize,
    ) -> Self {
        Self {
            store,
            chain,
            metrics,
            workers: workers.max(1),
            channel_size: channel_size.max(1),
            cancellations: RwLock::new(HashMap::new()),
        }
    }

    /// Requests cancellation of a running batch. Nodes already being
    /// processed terminate through their polling jobs; queued nodes are
    /// tombstoned without remote calls. Returns false for unknown or
    /// already settled batches.
    pub fn cancel(&self, batch_id: Uuid) -> bool {
        match self
            .cancellations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&batch_id)
        {
            Some(flag) => {
                info!(%batch_id, "Batch cancellation requested");
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Runs one crawl to its terminal state and returns the batch id.
    ///
    /// The returned id is already resolvable through the store while the
    /// batch is still running, because a snapshot is persisted after every
    /// collected record.
    pub async fn execute(&self, request: CrawlRequest) -> Result<Uuid, BatchError> {
        let mut batch = Batch::new(request.roots.len());
        let batch_id = batch.id;
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancellations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(batch_id, Arc::clone(&cancel));

        info!(
            %batch_id,
            roots = request.roots.len(),
            depth = request.parameters.depth,
            "Batch accepted"
        );
        self.store.save(batch.clone()).await;
        batch.transition(BatchState::Running)?;
        self.store.save(batch.clone()).await;

        let result = self
            .run_to_completion(&mut batch, &request, &cancel)
            .await;

        self.cancellations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&batch_id);

        match result {
            Ok(()) => {
                let terminal = if cancel.load(Ordering::Relaxed) {
                    BatchState::Cancelled
                } else {
                    BatchState::Completed
                };
                batch.transition(terminal)?;
                self.store.save(batch.clone()).await;
                self.metrics.record_batch_completed();
                info!(
                    %batch_id,
                    state = ?terminal,
                    records = batch.records.len(),
                    submodels = batch.submodel_count(),
                    tombstones = batch.tombstone_count(),
                    "Batch settled"
                );
                Ok(batch_id)
            }
            Err(error) => {
                batch.transition(BatchState::Error)?;
                self.store.save(batch).await;
                warn!(%batch_id, %error, "Batch failed");
                Err(error)
            }
        }
    }

    async fn run_to_completion(
        &self,
        batch: &mut Batch,
        request: &CrawlRequest,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), BatchError> {
        // Results are unbounded so a worker never blocks reporting while the
        // collector is blocked dispatching into a full worker channel.
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<JobRecord>();

        let mut worker_channels = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let (tx, rx) = mpsc::channel::<JobAssignment>(self.channel_size);
            worker_channels.push(tx);
            self.spawn_worker(worker_id, rx, result_tx.clone(), request, cancel);
        }
        drop(result_tx);

        let mut visited: HashSet<String> = HashSet::new();
        let mut outstanding = 0usize;
        let mut next_worker = 0usize;

        for root in &request.roots {
            if !visited.insert(root.global_asset_id.clone()) {
                continue;
            }
            let job_id = Uuid::new_v4();
            if dispatch(
                &worker_channels,
                &mut next_worker,
                JobAssignment {
                    job_id,
                    key: root.clone(),
                    depth: 0,
                },
            )
            .await
            {
                batch.register_job(job_id);
                outstanding += 1;
            }
        }
        // Persist the dispatched job ids while the batch is still running.
        self.store.save(batch.clone()).await;

        while outstanding > 0 {
            let Some(record) = result_rx.recv().await else {
                return Err(BatchError::WorkersLost { outstanding });
            };
            outstanding -= 1;

            let child_depth = record.depth + 1;
            if child_depth <= request.parameters.depth && !cancel.load(Ordering::Relaxed) {
                for child in record.container.child_keys() {
                    if !visited.insert(child.global_asset_id.clone()) {
                        debug!(
                            global_asset_id = %child.global_asset_id,
                            "Child already visited in this batch, skipping"
                        );
                        continue;
                    }
                    let job_id = Uuid::new_v4();
                    if dispatch(
                        &worker_channels,
                        &mut next_worker,
                        JobAssignment {
                            job_id,
                            key: child.clone(),
                            depth: child_depth,
                        },
                    )
                    .await
                    {
                        batch.register_job(job_id);
                        outstanding += 1;
                    }
                }
            }

            self.metrics.record_job(
                record.container.submodels().len(),
                record.container.tombstones().len(),
            );
            batch.add_record(record);
            self.store.save(batch.clone()).await;
        }

        Ok(())
    }

    fn spawn_worker(
        &self,
        worker_id: usize,
        mut assignments: mpsc::Receiver<JobAssignment>,
        results: mpsc::UnboundedSender<JobRecord>,
        request: &CrawlRequest,
        cancel: &Arc<AtomicBool>,
    ) {
        let chain = Arc::clone(&self.chain);
        let parameters = request.parameters.clone();
        let cancel = Arc::clone(cancel);

        tokio::spawn(async move {
            while let Some(assignment) = assignments.recv().await {
                let container = if cancel.load(Ordering::Relaxed) {
                    skipped_container(&assignment.key)
                } else {
                    let mut transfer = AasTransferProcess::new(Arc::clone(&cancel));
                    chain
                        .run(&parameters, &mut transfer, &assignment.key)
                        .await
                };

                debug!(
                    worker_id,
                    global_asset_id = %assignment.key.global_asset_id,
                    depth = assignment.depth,
                    submodels = container.submodels().len(),
                    tombstones = container.tombstones().len(),
                    "Node processed"
                );

                let record = JobRecord {
                    job_id: assignment.job_id,
                    key: assignment.key,
                    depth: assignment.depth,
                    container,
                };
                if results.send(record).is_err() {
                    break;
                }
            }
        });
    }
}

/// Container for a node the batch never got to process.
fn skipped_container(key: &PartChainIdentificationKey) -> ItemContainer {
    let mut container = ItemContainer::default();
    container.add_tombstone(Tombstone::from_failure(
        key.global_asset_id.clone(),
        None,
        ProcessStep::DigitalTwinRequest,
        "batch cancelled before the node was processed",
        0,
    ));
    container
}

/// Round-robins the assignment to the next worker. Returns false if that
/// worker's channel is closed; the assignment is then dropped rather than
/// counted as outstanding.
async fn dispatch(
    worker_channels: &[mpsc::Sender<JobAssignment>],
    next_worker: &mut usize,
    assignment: JobAssignment,
) -> bool {
    let index = *next_worker % worker_channels.len();
    *next_worker += 1;
    match worker_channels[index].send(assignment).await {
        Ok(()) => true,
        Err(_) => {
            warn!(worker = index, "Worker channel closed, assignment dropped");
            false
        }
    }
}
