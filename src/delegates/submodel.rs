use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::container::{AasTransferProcess, ItemContainer, TraversalParameters};
use super::fetch::fetch_over_connectors;
use super::ProcessingDelegate;
use crate::config::PollingConfig;
use crate::exchange::{ConnectorEndpoints, SubmodelClient};
use crate::model::{PartChainIdentificationKey, ProcessStep, Submodel, Tombstone};
use crate::polling::PollingService;
use crate::semantics::{SchemaError, SchemaProvider, SchemaValidator};

/// Final stage: retrieves and validates the payload of every remaining
/// descriptor.
///
/// Each descriptor resolves independently; a failure becomes a tombstone for
/// that descriptor and processing moves on. For every descriptor entering the
/// stage, exactly one of a submodel or a tombstone leaves it.
pub struct SubmodelDelegate {
    client: Arc<dyn SubmodelClient>,
    connectors: Arc<dyn ConnectorEndpoints>,
    schemas: Arc<dyn SchemaProvider>,
    validator: Arc<dyn SchemaValidator>,
    polling: PollingService,
    polling_config: PollingConfig,
}

impl SubmodelDelegate {
    pub fn new(
        client: Arc<dyn SubmodelClient>,
        connectors: Arc<dyn ConnectorEndpoints>,
        schemas: Arc<dyn SchemaProvider>,
        validator: Arc<dyn SchemaValidator>,
        polling: PollingService,
        polling_config: PollingConfig,
    ) -> Self {
        Self {
            client,
            connectors,
            schemas,
            validator,
            polling,
            polling_config,
        }
    }
}

#[async_trait]
impl ProcessingDelegate for SubmodelDelegate {
    fn name(&self) -> &'static str {
        "submodel"
    }

    async fn process(
        &self,
        mut container: ItemContainer,
        _parameters: &TraversalParameters,
        transfer: &mut AasTransferProcess,
        key: &PartChainIdentificationKey,
    ) -> ItemContainer {
        let descriptors: Vec<_> = container
            .shells()
            .iter()
            .flat_map(|shell| shell.submodel_descriptors.iter())
            .cloned()
            .collect();

        for descriptor in descriptors {
            let Some(aspect_type) = descriptor.aspect_type().map(str::to_string) else {
                container.add_tombstone(Tombstone::from_failure(
                    key.global_asset_id.clone(),
                    descriptor.declared_href().map(str::to_string),
                    ProcessStep::SchemaRequest,
                    "descriptor carries no semantic id",
                    0,
                ));
                continue;
            };

            let Some(bpn) = key.resolved_bpn() else {
                container.add_tombstone(Tombstone::from_failure(
                    key.global_asset_id.clone(),
                    descriptor.declared_href().map(str::to_string),
                    ProcessStep::SubmodelRequest,
                    "identification key carries no business partner number",
                    0,
                ));
                continue;
            };

            let schema = match self.schemas.schema_for(&aspect_type).await {
                Ok(schema) => schema,
                Err(error @ SchemaError::Malformed(_)) => {
                    container.add_tombstone(Tombstone::from_failure(
                        key.global_asset_id.clone(),
                        descriptor.declared_href().map(str::to_string),
                        ProcessStep::SchemaValidation,
                        error.to_string(),
                        0,
                    ));
                    continue;
                }
                Err(error) => {
                    container.add_tombstone(Tombstone::from_failure(
                        key.global_asset_id.clone(),
                        descriptor.declared_href().map(str::to_string),
                        ProcessStep::SchemaRequest,
                        error.to_string(),
                        0,
                    ));
                    continue;
                }
            };

            let endpoints = self.connectors.endpoints_for(bpn).await;

            let payload = match fetch_over_connectors(
                &self.client,
                &self.polling,
                self.polling_config.poll_interval.as_duration(),
                self.polling_config.request_ttl.as_duration(),
                &endpoints,
                &descriptor,
                key,
                transfer,
            )
            .await
            {
                Ok(payload) => payload,
                Err(failure) => {
                    container.add_tombstone(failure.into_tombstone(key));
                    continue;
                }
            };

            let value = match serde_json::from_str::<serde_json::Value>(&payload) {
                Ok(value) => value,
                Err(error) => {
                    warn!(
                        global_asset_id = %key.global_asset_id,
                        identification = %descriptor.identification,
                        %error,
                        "Submodel payload is not valid JSON"
                    );
                    container.add_tombstone(Tombstone::from_failure(
                        key.global_asset_id.clone(),
                        descriptor.declared_href().map(str::to_string),
                        ProcessStep::SchemaValidation,
                        error.to_string(),
                        0,
                    ));
                    continue;
                }
            };

            let report = self.validator.validate(&value, &schema);
            if !report.valid {
                container.add_tombstone(Tombstone::from_failure(
                    key.global_asset_id.clone(),
                    descriptor.declared_href().map(str::to_string),
                    ProcessStep::SchemaValidation,
                    report.violations.join("; "),
                    0,
                ));
                continue;
            }

            debug!(
                global_asset_id = %key.global_asset_id,
                identification = %descriptor.identification,
                aspect_type = %aspect_type,
                "Submodel collected"
            );
            container.add_submodel(Submodel::new(
                descriptor.identification.clone(),
                aspect_type,
                value,
            ));
        }

        container
    }
}
