//! End-to-end traversal tests: crawl requests through the orchestrator,
//! worker pool and delegate chain against mocked remote capabilities.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use partchain::batch::{
    BatchOrchestrator, BatchState, BatchStore, CrawlRequest, InMemoryBatchStore,
};
use partchain::config::PollingConfig;
use partchain::delegates::{DelegateChain, TraversalParameters};
use partchain::exchange::{
    ConnectorEndpoints, ExchangeError, SubmodelClient, TransferStatus,
};
use partchain::model::{
    PartChainIdentificationKey, ProcessStep, SemanticId, ShellDescriptor, SubmodelDescriptor,
};
use partchain::observability::Metrics;
use partchain::polling::PollingService;
use partchain::registry::{DigitalTwinRegistry, RegistryError};
use partchain::semantics::{
    SchemaDocument, SchemaError, SchemaProvider, SchemaValidator, ValidationReport,
};

const RELATIONSHIP: &str = "urn:bamm:io.partchain.part_relationship:1.0.0#PartRelationship";
const SERIAL_PART: &str = "urn:bamm:io.partchain.serial_part:1.0.0#SerialPart";

fn descriptor(item: &str, aspect: &str) -> SubmodelDescriptor {
    SubmodelDescriptor {
        identification: format!("sm-{item}-{aspect}"),
        id_short: None,
        descriptions: vec![],
        semantic_id: SemanticId::of(aspect),
        endpoints: vec![],
    }
}

fn shell(item: &str, aspects: &[&str]) -> ShellDescriptor {
    ShellDescriptor {
        global_asset_id: format!("urn:uuid:{item}"),
        id_short: Some(item.to_string()),
        submodel_descriptors: aspects
            .iter()
            .map(|aspect| descriptor(item, aspect))
            .collect(),
    }
}

fn relationship_payload(children: &[(&str, &str)]) -> String {
    let child_parts: Vec<_> = children
        .iter()
        .map(|(item, bpn)| {
            serde_json::json!({
                "globalAssetId": format!("urn:uuid:{item}"),
                "bpn": bpn,
            })
        })
        .collect();
    serde_json::json!({ "childParts": child_parts }).to_string()
}

struct MapRegistry {
    shells: HashMap<String, ShellDescriptor>,
}

#[async_trait]
impl DigitalTwinRegistry for MapRegistry {
    async fn shell_for(
        &self,
        key: &PartChainIdentificationKey,
    ) -> Result<ShellDescriptor, RegistryError> {
        self.shells
            .get(&key.global_asset_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.global_asset_id.clone()))
    }
}

struct SingleEndpoint;

#[async_trait]
impl ConnectorEndpoints for SingleEndpoint {
    async fn endpoints_for(&self, bpn: &str) -> Vec<String> {
        vec![format!("https://connector.example/{bpn}")]
    }
}

struct StaticSchemas;

#[async_trait]
impl SchemaProvider for StaticSchemas {
    async fn schema_for(&self, semantic_id: &str) -> Result<SchemaDocument, SchemaError> {
        Ok(SchemaDocument {
            semantic_id: semantic_id.to_string(),
            document: serde_json::json!({"type": "object"}),
        })
    }
}

struct AcceptAll;

impl SchemaValidator for AcceptAll {
    fn validate(&self, _payload: &serde_json::Value, _schema: &SchemaDocument) -> ValidationReport {
        ValidationReport::valid()
    }
}

/// Completes transfers immediately with payloads keyed by descriptor
/// identification.
struct CannedClient {
    payloads: HashMap<String, String>,
    transfers: Mutex<HashMap<String, String>>,
}

impl CannedClient {
    fn new(payloads: HashMap<String, String>) -> Self {
        Self {
            payloads,
            transfers: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SubmodelClient for CannedClient {
    async fn request_transfer(
        &self,
        _connector_endpoint: &str,
        descriptor: &SubmodelDescriptor,
        _key: &PartChainIdentificationKey,
    ) -> Result<String, ExchangeError> {
        let payload = self
            .payloads
            .get(&descriptor.identification)
            .cloned()
            .unwrap_or_else(|| "{}".to_string());
        let id = format!("tp-{}", descriptor.identification);
        self.transfers.lock().unwrap().insert(id.clone(), payload);
        Ok(id)
    }

    async fn transfer_status(&self, transfer_process_id: &str) -> TransferStatus {
        match self.transfers.lock().unwrap().get(transfer_process_id) {
            Some(payload) => TransferStatus::Completed(payload.clone()),
            None => TransferStatus::Failed("unknown transfer".to_string()),
        }
    }
}

/// Never completes a transfer; used to keep a batch in flight.
struct StalledClient;

#[async_trait]
impl SubmodelClient for StalledClient {
    async fn request_transfer(
        &self,
        _connector_endpoint: &str,
        descriptor: &SubmodelDescriptor,
        _key: &PartChainIdentificationKey,
    ) -> Result<String, ExchangeError> {
        Ok(format!("tp-{}", descriptor.identification))
    }

    async fn transfer_status(&self, _transfer_process_id: &str) -> TransferStatus {
        TransferStatus::Pending
    }
}

fn polling_config() -> PollingConfig {
    let mut config = PollingConfig::default();
    config.poll_interval = Duration::from_millis(10).into();
    config
}

fn orchestrator(
    registry: Arc<dyn DigitalTwinRegistry>,
    client: Arc<dyn SubmodelClient>,
    store: Arc<InMemoryBatchStore>,
) -> BatchOrchestrator {
    let chain = DelegateChain::standard(
        registry,
        client,
        Arc::new(SingleEndpoint),
        Arc::new(StaticSchemas),
        Arc::new(AcceptAll),
        PollingService::system(),
        polling_config(),
    );
    BatchOrchestrator::new(store, Arc::new(chain), Arc::new(Metrics::new()), 2, 16)
}

#[tokio::test]
async fn test_two_level_crawl_collects_children() {
    let registry = Arc::new(MapRegistry {
        shells: HashMap::from([
            (
                "urn:uuid:gearbox".to_string(),
                shell("gearbox", &[RELATIONSHIP, SERIAL_PART]),
            ),
            (
                "urn:uuid:gear".to_string(),
                shell("gear", &[SERIAL_PART]),
            ),
            (
                "urn:uuid:shaft".to_string(),
                shell("shaft", &[SERIAL_PART]),
            ),
        ]),
    });
    let client = Arc::new(CannedClient::new(HashMap::from([(
        format!("sm-gearbox-{RELATIONSHIP}"),
        relationship_payload(&[("gear", "BPNL0002"), ("shaft", "BPNL0003")]),
    )])));
    let store = Arc::new(InMemoryBatchStore::new());
    let orchestrator = orchestrator(registry, client, store.clone());

    let batch_id = orchestrator
        .execute(CrawlRequest {
            roots: vec![PartChainIdentificationKey::new("urn:uuid:gearbox", "BPNL0001")],
            parameters: TraversalParameters::collect_all(1, RELATIONSHIP),
        })
        .await
        .unwrap();

    let batch = store.find(batch_id).await.unwrap();
    assert_eq!(batch.state, BatchState::Completed);
    // Root plus both depth-1 children.
    assert_eq!(batch.records.len(), 3);
    assert_eq!(batch.tombstone_count(), 0);
    // Relationship + serial part on the root, serial part per child.
    assert_eq!(batch.submodel_count(), 4);

    let depths: Vec<u32> = {
        let mut d: Vec<u32> = batch.records.iter().map(|r| r.depth).collect();
        d.sort_unstable();
        d
    };
    assert_eq!(depths, [0, 1, 1]);

    // Every dispatched job reported back under the id it was dispatched with.
    assert_eq!(batch.job_ids.len(), 3);
    assert!(batch.pending_job_ids().is_empty());
    for record in &batch.records {
        assert!(batch.job_ids.contains(&record.job_id));
    }
}

#[tokio::test]
async fn test_depth_zero_crawls_roots_only() {
    let registry = Arc::new(MapRegistry {
        shells: HashMap::from([(
            "urn:uuid:gearbox".to_string(),
            shell("gearbox", &[RELATIONSHIP]),
        )]),
    });
    let client = Arc::new(CannedClient::new(HashMap::from([(
        format!("sm-gearbox-{RELATIONSHIP}"),
        relationship_payload(&[("gear", "BPNL0002")]),
    )])));
    let store = Arc::new(InMemoryBatchStore::new());
    let orchestrator = orchestrator(registry, client, store.clone());

    let batch_id = orchestrator
        .execute(CrawlRequest {
            roots: vec![PartChainIdentificationKey::new("urn:uuid:gearbox", "BPNL0001")],
            parameters: TraversalParameters::collect_all(0, RELATIONSHIP),
        })
        .await
        .unwrap();

    let batch = store.find(batch_id).await.unwrap();
    assert_eq!(batch.state, BatchState::Completed);
    assert_eq!(batch.records.len(), 1);
    // Children were discovered but not dispatched.
    assert_eq!(batch.records[0].container.child_keys().len(), 1);
}

#[tokio::test]
async fn test_shared_child_is_processed_once() {
    let registry = Arc::new(MapRegistry {
        shells: HashMap::from([
            (
                "urn:uuid:left".to_string(),
                shell("left", &[RELATIONSHIP]),
            ),
            (
                "urn:uuid:right".to_string(),
                shell("right", &[RELATIONSHIP]),
            ),
            (
                "urn:uuid:shared".to_string(),
                shell("shared", &[SERIAL_PART]),
            ),
        ]),
    });
    let client = Arc::new(CannedClient::new(HashMap::from([
        (
            format!("sm-left-{RELATIONSHIP}"),
            relationship_payload(&[("shared", "BPNL0002")]),
        ),
        (
            format!("sm-right-{RELATIONSHIP}"),
            relationship_payload(&[("shared", "BPNL0002")]),
        ),
    ])));
    let store = Arc::new(InMemoryBatchStore::new());
    let orchestrator = orchestrator(registry, client, store.clone());

    let batch_id = orchestrator
        .execute(CrawlRequest {
            roots: vec![
                PartChainIdentificationKey::new("urn:uuid:left", "BPNL0001"),
                PartChainIdentificationKey::new("urn:uuid:right", "BPNL0001"),
            ],
            parameters: TraversalParameters::collect_all(1, RELATIONSHIP),
        })
        .await
        .unwrap();

    let batch = store.find(batch_id).await.unwrap();
    assert_eq!(batch.state, BatchState::Completed);
    // Two roots plus the shared child exactly once.
    assert_eq!(batch.records.len(), 3);
    let shared_records = batch
        .records
        .iter()
        .filter(|record| record.key.global_asset_id == "urn:uuid:shared")
        .count();
    assert_eq!(shared_records, 1);
}

#[tokio::test]
async fn test_missing_shell_tombstones_but_batch_completes() {
    let registry = Arc::new(MapRegistry {
        shells: HashMap::from([(
            "urn:uuid:known".to_string(),
            shell("known", &[SERIAL_PART]),
        )]),
    });
    let client = Arc::new(CannedClient::new(HashMap::new()));
    let store = Arc::new(InMemoryBatchStore::new());
    let orchestrator = orchestrator(registry, client, store.clone());

    let batch_id = orchestrator
        .execute(CrawlRequest {
            roots: vec![
                PartChainIdentificationKey::new("urn:uuid:known", "BPNL0001"),
                PartChainIdentificationKey::new("urn:uuid:unknown", "BPNL0001"),
            ],
            parameters: TraversalParameters::collect_all(1, RELATIONSHIP),
        })
        .await
        .unwrap();

    let batch = store.find(batch_id).await.unwrap();
    assert_eq!(batch.state, BatchState::Completed);
    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.submodel_count(), 1);
    assert_eq!(batch.tombstone_count(), 1);

    let tombstoned = batch
        .records
        .iter()
        .find(|record| !record.container.tombstones().is_empty())
        .unwrap();
    assert_eq!(
        tombstoned.container.tombstones()[0].process_step(),
        ProcessStep::DigitalTwinRequest
    );
}

#[tokio::test]
async fn test_cancellation_settles_batch_as_cancelled() {
    let registry = Arc::new(MapRegistry {
        shells: HashMap::from([(
            "urn:uuid:gearbox".to_string(),
            shell("gearbox", &[SERIAL_PART]),
        )]),
    });
    let store = Arc::new(InMemoryBatchStore::new());
    let orchestrator = Arc::new(orchestrator(
        registry,
        Arc::new(StalledClient),
        store.clone(),
    ));

    let runner = Arc::clone(&orchestrator);
    let execution = tokio::spawn(async move {
        runner
            .execute(CrawlRequest {
                roots: vec![PartChainIdentificationKey::new(
                    "urn:uuid:gearbox",
                    "BPNL0001",
                )],
                parameters: TraversalParameters::collect_all(1, RELATIONSHIP),
            })
            .await
    });

    // Wait until the batch is visibly running with dispatched jobs, then
    // cancel it. The running snapshot already names its pending work.
    let batch_id = loop {
        if let Some(batch) = store
            .find_all()
            .await
            .into_iter()
            .find(|batch| batch.state == BatchState::Running && !batch.job_ids.is_empty())
        {
            assert!(!batch.pending_job_ids().is_empty());
            break batch.id;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert!(orchestrator.cancel(batch_id));

    let result = execution.await.unwrap().unwrap();
    assert_eq!(result, batch_id);

    let batch = store.find(batch_id).await.unwrap();
    assert_eq!(batch.state, BatchState::Cancelled);
    // The stalled transfer was abandoned, leaving a tombstone.
    assert_eq!(batch.tombstone_count(), 1);

    // A settled batch can no longer be cancelled.
    assert!(!orchestrator.cancel(batch_id));
}
