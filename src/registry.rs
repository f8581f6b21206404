//! Digital twin registry capability
//!
//! Shell descriptor lookup is consumed as an external capability; its
//! transport and authentication are out of scope.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{PartChainIdentificationKey, ShellDescriptor};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no shell descriptor registered for {0}")]
    NotFound(String),

    #[error("registry lookup failed: {0}")]
    Transport(String),
}

/// Resolves the shell descriptor listing the submodels of one item
#[async_trait]
pub trait DigitalTwinRegistry: Send + Sync {
    async fn shell_for(
        &self,
        key: &PartChainIdentificationKey,
    ) -> Result<ShellDescriptor, RegistryError>;
}
