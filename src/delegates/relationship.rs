use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::container::{AasTransferProcess, ItemContainer, TraversalParameters};
use super::fetch::fetch_over_connectors;
use super::ProcessingDelegate;
use crate::config::PollingConfig;
use crate::exchange::{ConnectorEndpoints, SubmodelClient};
use crate::model::{PartChainIdentificationKey, ProcessStep, Tombstone};
use crate::polling::PollingService;

/// Relationship aspect payload naming the child items of a node
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipPayload {
    #[serde(default)]
    child_parts: Vec<ChildPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildPart {
    global_asset_id: String,
    #[serde(default)]
    bpn: Option<String>,
}

/// Second stage: retrieves the relationship aspect and extracts child keys.
///
/// Runs before the aspect filter on purpose: child discovery must work even
/// when the caller requested a narrow aspect selection that excludes the
/// relationship aspect itself.
pub struct RelationshipDelegate {
    client: Arc<dyn SubmodelClient>,
    connectors: Arc<dyn ConnectorEndpoints>,
    polling: PollingService,
    polling_config: PollingConfig,
}

impl RelationshipDelegate {
    pub fn new(
        client: Arc<dyn SubmodelClient>,
        connectors: Arc<dyn ConnectorEndpoints>,
        polling: PollingService,
        polling_config: PollingConfig,
    ) -> Self {
        Self {
            client,
            connectors,
            polling,
            polling_config,
        }
    }
}

#[async_trait]
impl ProcessingDelegate for RelationshipDelegate {
    fn name(&self) -> &'static str {
        "relationship"
    }

    async fn process(
        &self,
        mut container: ItemContainer,
        parameters: &TraversalParameters,
        transfer: &mut AasTransferProcess,
        key: &PartChainIdentificationKey,
    ) -> ItemContainer {
        let descriptors: Vec<_> = container
            .shells()
            .iter()
            .flat_map(|shell| shell.submodel_descriptors.iter())
            .filter(|descriptor| {
                descriptor
                    .semantic_id
                    .matches(&parameters.relationship_aspect)
            })
            .cloned()
            .collect();

        if descriptors.is_empty() {
            debug!(
                global_asset_id = %key.global_asset_id,
                aspect = %parameters.relationship_aspect,
                "Node offers no relationship aspect, treating as leaf"
            );
            return container;
        }

        let Some(bpn) = key.resolved_bpn() else {
            for descriptor in &descriptors {
                container.add_tombstone(Tombstone::from_failure(
                    key.global_asset_id.clone(),
                    descriptor.declared_href().map(str::to_string),
                    ProcessStep::SubmodelRequest,
                    "identification key carries no business partner number",
                    0,
                ));
            }
            return container;
        };

        let endpoints = self.connectors.endpoints_for(bpn).await;

        for descriptor in &descriptors {
            let payload = fetch_over_connectors(
                &self.client,
                &self.polling,
                self.polling_config.poll_interval.as_duration(),
                self.polling_config.request_ttl.as_duration(),
                &endpoints,
                descriptor,
                key,
                transfer,
            )
            .await;

            let payload = match payload {
                Ok(payload) => payload,
                Err(failure) => {
                    container.add_tombstone(failure.into_tombstone(key));
                    continue;
                }
            };

            match serde_json::from_str::<RelationshipPayload>(&payload) {
                Ok(relationships) => {
                    debug!(
                        global_asset_id = %key.global_asset_id,
                        children = relationships.child_parts.len(),
                        "Child items discovered"
                    );
                    for child in relationships.child_parts {
                        container.add_child_key(match child.bpn {
                            Some(bpn) => PartChainIdentificationKey::new(child.global_asset_id, bpn),
                            None => PartChainIdentificationKey::without_bpn(child.global_asset_id),
                        });
                    }
                }
                Err(error) => {
                    warn!(
                        global_asset_id = %key.global_asset_id,
                        identification = %descriptor.identification,
                        %error,
                        "Relationship payload is not parseable"
                    );
                    container.add_tombstone(Tombstone::from_failure(
                        key.global_asset_id.clone(),
                        descriptor.declared_href().map(str::to_string),
                        ProcessStep::SchemaValidation,
                        error.to_string(),
                        0,
                    ));
                }
            }
        }

        container
    }
}
