//! Connector retry protocol shared by the retrieval stages
//!
//! The same logical submodel may be offered by more than one connector of the
//! owning partner. A catalog-not-found on one endpoint therefore retries the
//! next endpoint; a usage-policy rejection is descriptor-wide and stops the
//! attempt sequence immediately, as does a generic transport failure.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::container::AasTransferProcess;
use crate::exchange::{ExchangeError, SubmodelClient, TransferStatus};
use crate::model::{PartChainIdentificationKey, ProcessStep, SubmodelDescriptor, Tombstone};
use crate::polling::{PollOutcome, PollState, PollingService};

/// Why a payload could not be retrieved, with enough context for a tombstone
pub(super) struct FetchFailure {
    pub step: ProcessStep,
    pub endpoint: Option<String>,
    pub attempts: u32,
    pub detail: String,
}

impl FetchFailure {
    pub fn into_tombstone(self, key: &PartChainIdentificationKey) -> Tombstone {
        Tombstone::from_failure(
            key.global_asset_id.clone(),
            self.endpoint,
            self.step,
            self.detail,
            self.attempts,
        )
    }
}

/// Attempts the payload fetch against the partner's connector endpoints in
/// turn, driving each started transfer to completion through a polling job.
pub(super) async fn fetch_over_connectors(
    client: &Arc<dyn SubmodelClient>,
    polling: &PollingService,
    poll_interval: Duration,
    request_ttl: Duration,
    endpoints: &[String],
    descriptor: &SubmodelDescriptor,
    key: &PartChainIdentificationKey,
    transfer: &mut AasTransferProcess,
) -> Result<String, FetchFailure> {
    if endpoints.is_empty() {
        return Err(FetchFailure {
            step: ProcessStep::SubmodelRequest,
            endpoint: None,
            attempts: 0,
            detail: "no connector endpoints discovered for owning business partner".to_string(),
        });
    }

    let mut attempts = 0;
    let mut last_endpoint = None;

    for endpoint in endpoints {
        attempts += 1;
        last_endpoint = Some(endpoint.clone());

        let transfer_process_id = match client.request_transfer(endpoint, descriptor, key).await {
            Ok(id) => id,
            Err(ExchangeError::NotFoundInCatalog { .. }) => {
                debug!(
                    %endpoint,
                    identification = %descriptor.identification,
                    attempts,
                    "Item not in catalog, trying next connector endpoint"
                );
                continue;
            }
            Err(ExchangeError::UsagePolicyDenied(detail)) => {
                return Err(FetchFailure {
                    step: ProcessStep::UsagePolicyValidation,
                    endpoint: last_endpoint,
                    attempts,
                    detail,
                });
            }
            Err(ExchangeError::Transport(detail)) => {
                return Err(FetchFailure {
                    step: ProcessStep::SubmodelRequest,
                    endpoint: last_endpoint,
                    attempts,
                    detail,
                });
            }
        };

        transfer.register_transfer(transfer_process_id.clone());

        let status_client = Arc::clone(client);
        let status_id = transfer_process_id.clone();
        let job = polling
            .create_job::<String>()
            .description(format!("transfer {transfer_process_id}"))
            .status_check(Box::new(move || {
                let client = Arc::clone(&status_client);
                let id = status_id.clone();
                Box::pin(async move {
                    match client.transfer_status(&id).await {
                        TransferStatus::Pending => PollState::Pending,
                        TransferStatus::Completed(payload) => PollState::Complete(payload),
                        TransferStatus::Failed(error) => PollState::Failed(error),
                    }
                })
            }))
            .poll_interval(poll_interval)
            .max_wait(request_ttl)
            .cancelled_flag(transfer.cancel_flag())
            .build();

        let job = match job {
            Ok(job) => job,
            Err(error) => {
                return Err(FetchFailure {
                    step: ProcessStep::SubmodelRequest,
                    endpoint: last_endpoint,
                    attempts,
                    detail: format!("polling job rejected: {error}"),
                });
            }
        };

        return match job.spawn().outcome().await {
            PollOutcome::Complete(payload) => Ok(payload),
            PollOutcome::Failed(detail) => Err(FetchFailure {
                step: ProcessStep::SubmodelRequest,
                endpoint: last_endpoint,
                attempts,
                detail,
            }),
            PollOutcome::TimedOut => Err(FetchFailure {
                step: ProcessStep::SubmodelRequest,
                endpoint: last_endpoint,
                attempts,
                detail: format!(
                    "transfer {transfer_process_id} did not complete within the request TTL"
                ),
            }),
            PollOutcome::Cancelled => Err(FetchFailure {
                step: ProcessStep::SubmodelRequest,
                endpoint: last_endpoint,
                attempts,
                detail: "batch was cancelled while the transfer was in flight".to_string(),
            }),
        };
    }

    warn!(
        identification = %descriptor.identification,
        attempts,
        "Item not present in catalog of any known connector"
    );
    Err(FetchFailure {
        step: ProcessStep::SubmodelRequest,
        endpoint: last_endpoint,
        attempts,
        detail: "item not present in catalog of any known connector".to_string(),
    })
}
