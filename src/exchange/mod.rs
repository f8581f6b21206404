//! Data-exchange client and connector discovery capabilities
//!
//! The data-exchange protocol itself (catalog lookup, contract negotiation,
//! transfer-process handshake) is a black box behind [`SubmodelClient`]. The
//! client is two-phase: [`SubmodelClient::request_transfer`] starts a remote
//! transfer and returns its process id, and [`SubmodelClient::transfer_status`]
//! is probed by a polling job until the transfer completes or fails. The error
//! taxonomy is load-bearing for the retry protocol: catalog-not-found retries
//! against the next known connector endpoint, usage-policy rejections and
//! transport failures do not.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

use crate::model::{PartChainIdentificationKey, SubmodelDescriptor};

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The resource is not present in this connector's catalog. Another
    /// connector of the same partner may still offer it.
    #[error("item not found in catalog of {endpoint}")]
    NotFoundInCatalog { endpoint: String },

    /// The remote side refused based on contractual terms. Descriptor-wide;
    /// never retried against other endpoints.
    #[error("usage policy denied access: {0}")]
    UsagePolicyDenied(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// State of one remote transfer process
#[derive(Debug, Clone)]
pub enum TransferStatus {
    Pending,
    Completed(String),
    Failed(String),
}

/// Black-box client for the negotiated data-exchange protocol
#[async_trait]
pub trait SubmodelClient: Send + Sync {
    /// Start a transfer for the descriptor's payload at one connector
    /// endpoint. Returns the remote transfer-process id on success.
    async fn request_transfer(
        &self,
        connector_endpoint: &str,
        descriptor: &SubmodelDescriptor,
        key: &PartChainIdentificationKey,
    ) -> Result<String, ExchangeError>;

    /// Current state of a previously requested transfer.
    async fn transfer_status(&self, transfer_process_id: &str) -> TransferStatus;
}

/// Resolves the connector endpoints known for a business partner.
///
/// An empty list is a valid result (no known endpoints).
#[async_trait]
pub trait ConnectorEndpoints: Send + Sync {
    async fn endpoints_for(&self, bpn: &str) -> Vec<String>;
}

/// Memoizing wrapper around a discovery service.
///
/// Safe for concurrent read/write from multiple worker tasks; each key's
/// endpoint list is treated as a single atomic unit.
pub struct CachingConnectorEndpoints {
    inner: Arc<dyn ConnectorEndpoints>,
    cache: RwLock<HashMap<String, Vec<String>>>,
}

impl CachingConnectorEndpoints {
    pub fn new(inner: Arc<dyn ConnectorEndpoints>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ConnectorEndpoints for CachingConnectorEndpoints {
    async fn endpoints_for(&self, bpn: &str) -> Vec<String> {
        if let Some(endpoints) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bpn)
        {
            return endpoints.clone();
        }

        let endpoints = self.inner.endpoints_for(bpn).await;
        debug!(bpn, count = endpoints.len(), "Connector endpoints resolved");

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bpn.to_string(), endpoints.clone());

        endpoints
    }
}
