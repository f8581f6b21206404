use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::container::{AasTransferProcess, ItemContainer, TraversalParameters};
use super::ProcessingDelegate;
use crate::model::{PartChainIdentificationKey, ProcessStep, Tombstone};
use crate::registry::DigitalTwinRegistry;

/// First stage: resolves the node's shell descriptor.
///
/// Without a shell nothing downstream can run, so a failed lookup leaves a
/// single digital-twin-request tombstone and an otherwise empty container.
pub struct DigitalTwinDelegate {
    registry: Arc<dyn DigitalTwinRegistry>,
}

impl DigitalTwinDelegate {
    pub fn new(registry: Arc<dyn DigitalTwinRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ProcessingDelegate for DigitalTwinDelegate {
    fn name(&self) -> &'static str {
        "digital_twin"
    }

    async fn process(
        &self,
        mut container: ItemContainer,
        _parameters: &TraversalParameters,
        _transfer: &mut AasTransferProcess,
        key: &PartChainIdentificationKey,
    ) -> ItemContainer {
        match self.registry.shell_for(key).await {
            Ok(shell) => {
                info!(
                    global_asset_id = %key.global_asset_id,
                    descriptors = shell.submodel_descriptors.len(),
                    "Shell descriptor resolved"
                );
                container.add_shell(shell);
            }
            Err(error) => {
                warn!(
                    global_asset_id = %key.global_asset_id,
                    %error,
                    "Shell descriptor lookup failed"
                );
                container.add_tombstone(Tombstone::from_failure(
                    key.global_asset_id.clone(),
                    None,
                    ProcessStep::DigitalTwinRequest,
                    error.to_string(),
                    0,
                ));
            }
        }
        container
    }
}
