//! Delegate chain turning one shell descriptor into validated submodels
//! and tombstones
//!
//! ## Key components
//!
//! - [`ProcessingDelegate`] - contract every stage implements
//! - [`DelegateChain`] - fixed ordered sequence of stages
//! - [`ItemContainer`] - per-node accumulator handed from stage to stage
//! - [`DigitalTwinDelegate`] - resolves the shell descriptor
//! - [`RelationshipDelegate`] - discovers child identification keys
//! - [`AspectFilterDelegate`] - applies the requested aspect selection
//! - [`SubmodelDelegate`] - retrieves and validates submodel payloads
//!
//! The chain always runs to completion: a stage that cannot proceed records
//! tombstones and hands the container to the next stage unchanged. Failures
//! are data, never short-circuiting control flow.

mod aspect_filter;
mod container;
mod digital_twin;
mod fetch;
mod relationship;
mod submodel;

pub use aspect_filter::AspectFilterDelegate;
pub use container::{AasTransferProcess, AspectSelection, ItemContainer, TraversalParameters};
pub use digital_twin::DigitalTwinDelegate;
pub use relationship::RelationshipDelegate;
pub use submodel::SubmodelDelegate;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::PollingConfig;
use crate::exchange::{ConnectorEndpoints, SubmodelClient};
use crate::model::PartChainIdentificationKey;
use crate::polling::PollingService;
use crate::registry::DigitalTwinRegistry;
use crate::semantics::{SchemaProvider, SchemaValidator};

/// One stage of the processing pipeline
#[async_trait]
pub trait ProcessingDelegate: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(
        &self,
        container: ItemContainer,
        parameters: &TraversalParameters,
        transfer: &mut AasTransferProcess,
        key: &PartChainIdentificationKey,
    ) -> ItemContainer;
}

/// Fixed ordered sequence of processing stages
pub struct DelegateChain {
    stages: Vec<Arc<dyn ProcessingDelegate>>,
}

impl DelegateChain {
    pub fn new(stages: Vec<Arc<dyn ProcessingDelegate>>) -> Self {
        Self { stages }
    }

    /// The standard chain: shell lookup, child discovery, aspect filter,
    /// submodel retrieval.
    pub fn standard(
        registry: Arc<dyn DigitalTwinRegistry>,
        client: Arc<dyn SubmodelClient>,
        connectors: Arc<dyn ConnectorEndpoints>,
        schemas: Arc<dyn SchemaProvider>,
        validator: Arc<dyn SchemaValidator>,
        polling: PollingService,
        polling_config: PollingConfig,
    ) -> Self {
        Self::new(vec![
            Arc::new(DigitalTwinDelegate::new(registry)),
            Arc::new(RelationshipDelegate::new(
                Arc::clone(&client),
                Arc::clone(&connectors),
                polling.clone(),
                polling_config.clone(),
            )),
            Arc::new(AspectFilterDelegate),
            Arc::new(SubmodelDelegate::new(
                client,
                connectors,
                schemas,
                validator,
                polling,
                polling_config,
            )),
        ])
    }

    /// Runs every stage in order over a fresh container.
    pub async fn run(
        &self,
        parameters: &TraversalParameters,
        transfer: &mut AasTransferProcess,
        key: &PartChainIdentificationKey,
    ) -> ItemContainer {
        let mut container = ItemContainer::default();
        for stage in &self.stages {
            debug!(
                stage = stage.name(),
                global_asset_id = %key.global_asset_id,
                "Running delegate"
            );
            container = stage.process(container, parameters, transfer, key).await;
        }
        container
    }
}
