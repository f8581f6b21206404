use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{
    PartChainIdentificationKey, ShellDescriptor, Submodel, SubmodelDescriptor, Tombstone,
};

/// Which aspect types a crawl collects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectSelection {
    /// Collect every aspect offered by the shell
    All,
    /// Collect only the named aspect types
    Named(Vec<String>),
}

impl AspectSelection {
    pub fn matches(&self, descriptor: &SubmodelDescriptor) -> bool {
        match self {
            AspectSelection::All => true,
            AspectSelection::Named(aspects) => aspects
                .iter()
                .any(|aspect| descriptor.semantic_id.matches(aspect)),
        }
    }
}

/// Traversal policy for one crawl request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalParameters {
    pub aspects: AspectSelection,
    /// Maximum hop count; roots are depth 0, so `0` crawls roots only
    pub depth: u32,
    /// Aspect type whose payload names child items
    pub relationship_aspect: String,
}

impl TraversalParameters {
    pub fn collect_all(depth: u32, relationship_aspect: impl Into<String>) -> Self {
        Self {
            aspects: AspectSelection::All,
            depth,
            relationship_aspect: relationship_aspect.into(),
        }
    }

    pub fn collect_named(
        aspects: Vec<String>,
        depth: u32,
        relationship_aspect: impl Into<String>,
    ) -> Self {
        Self {
            aspects: AspectSelection::Named(aspects),
            depth,
            relationship_aspect: relationship_aspect.into(),
        }
    }
}

/// Transient transfer state threaded through the chain for one node.
///
/// Accumulates the remote transfer-process ids currently outstanding so a
/// resumed poll can be correlated to the node, and carries the batch's
/// cancellation flag down to in-flight polling jobs. Discarded once the
/// chain for the node terminates.
#[derive(Debug, Clone)]
pub struct AasTransferProcess {
    transfer_process_ids: Vec<String>,
    cancel: Arc<AtomicBool>,
}

impl AasTransferProcess {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            transfer_process_ids: Vec::new(),
            cancel,
        }
    }

    pub fn register_transfer(&mut self, transfer_process_id: impl Into<String>) {
        self.transfer_process_ids.push(transfer_process_id.into());
    }

    pub fn transfer_process_ids(&self) -> &[String] {
        &self.transfer_process_ids
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl Default for AasTransferProcess {
    fn default() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }
}

/// Per-node accumulator for everything the chain produces.
///
/// Merge-only: stages append shells, submodels, tombstones and child keys and
/// never remove or mutate earlier entries. The one sanctioned exception is
/// [`ItemContainer::retain_descriptors`], which the aspect filter uses to drop
/// not-yet-processed descriptors before retrieval. Once the chain finishes,
/// the container is folded into the batch result and treated as immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemContainer {
    shells: Vec<ShellDescriptor>,
    submodels: Vec<Submodel>,
    tombstones: Vec<Tombstone>,
    child_keys: Vec<PartChainIdentificationKey>,
}

impl ItemContainer {
    pub fn add_shell(&mut self, shell: ShellDescriptor) {
        self.shells.push(shell);
    }

    pub fn add_submodel(&mut self, submodel: Submodel) {
        self.submodels.push(submodel);
    }

    pub fn add_tombstone(&mut self, tombstone: Tombstone) {
        self.tombstones.push(tombstone);
    }

    pub fn add_child_key(&mut self, key: PartChainIdentificationKey) {
        self.child_keys.push(key);
    }

    /// Drops descriptors not matching the predicate from every shell.
    pub fn retain_descriptors(&mut self, mut keep: impl FnMut(&SubmodelDescriptor) -> bool) {
        for shell in &mut self.shells {
            shell.submodel_descriptors.retain(&mut keep);
        }
    }

    pub fn shells(&self) -> &[ShellDescriptor] {
        &self.shells
    }

    pub fn submodels(&self) -> &[Submodel] {
        &self.submodels
    }

    pub fn tombstones(&self) -> &[Tombstone] {
        &self.tombstones
    }

    pub fn child_keys(&self) -> &[PartChainIdentificationKey] {
        &self.child_keys
    }

    /// Descriptors currently present across all shells.
    pub fn descriptor_count(&self) -> usize {
        self.shells
            .iter()
            .map(|shell| shell.submodel_descriptors.len())
            .sum()
    }
}
