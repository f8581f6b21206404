use async_trait::async_trait;
use tracing::debug;

use super::container::{AasTransferProcess, ItemContainer, TraversalParameters};
use super::ProcessingDelegate;
use crate::model::PartChainIdentificationKey;

/// Third stage: narrows the shell's descriptors to the requested aspects.
///
/// Runs after child discovery so the relationship aspect has already been
/// consumed, and before retrieval so excluded aspects cause no remote calls.
pub struct AspectFilterDelegate;

#[async_trait]
impl ProcessingDelegate for AspectFilterDelegate {
    fn name(&self) -> &'static str {
        "aspect_filter"
    }

    async fn process(
        &self,
        mut container: ItemContainer,
        parameters: &TraversalParameters,
        _transfer: &mut AasTransferProcess,
        key: &PartChainIdentificationKey,
    ) -> ItemContainer {
        let before = container.descriptor_count();
        container.retain_descriptors(|descriptor| parameters.aspects.matches(descriptor));
        debug!(
            global_asset_id = %key.global_asset_id,
            before,
            after = container.descriptor_count(),
            "Aspect filter applied"
        );
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegates::AspectSelection;
    use crate::model::{SemanticId, ShellDescriptor, SubmodelDescriptor};

    fn container() -> ItemContainer {
        let descriptor = |aspect: &str| SubmodelDescriptor {
            identification: format!("sm-{aspect}"),
            id_short: None,
            descriptions: vec![],
            semantic_id: SemanticId::of(aspect),
            endpoints: vec![],
        };

        let mut container = ItemContainer::default();
        container.add_shell(ShellDescriptor {
            global_asset_id: "urn:uuid:item-1".to_string(),
            id_short: None,
            submodel_descriptors: vec![descriptor("serial_part"), descriptor("assembly_site")],
        });
        container
    }

    #[tokio::test]
    async fn test_named_selection_drops_other_aspects() {
        let parameters = TraversalParameters::collect_named(
            vec!["serial_part".to_string()],
            1,
            "part_relationship",
        );

        let key = PartChainIdentificationKey::new("urn:uuid:item-1", "BPNL0001");
        let mut transfer = AasTransferProcess::default();
        let filtered = AspectFilterDelegate
            .process(container(), &parameters, &mut transfer, &key)
            .await;

        assert_eq!(filtered.descriptor_count(), 1);
        assert_eq!(
            filtered.shells()[0].submodel_descriptors[0].aspect_type(),
            Some("serial_part")
        );
    }

    #[tokio::test]
    async fn test_collect_all_keeps_everything() {
        let parameters = TraversalParameters {
            aspects: AspectSelection::All,
            depth: 1,
            relationship_aspect: "part_relationship".to_string(),
        };

        let key = PartChainIdentificationKey::new("urn:uuid:item-1", "BPNL0001");
        let mut transfer = AasTransferProcess::default();
        let filtered = AspectFilterDelegate
            .process(container(), &parameters, &mut transfer, &key)
            .await;

        assert_eq!(filtered.descriptor_count(), 2);
    }
}
