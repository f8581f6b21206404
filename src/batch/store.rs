use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::Batch;

/// Keyed batch persistence.
///
/// `save` upserts: the latest snapshot for an id wins. Implementations must
/// be safe for concurrent access from the orchestrator and readers.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn save(&self, batch: Batch);

    async fn find(&self, batch_id: Uuid) -> Option<Batch>;

    async fn find_all(&self) -> Vec<Batch>;
}

/// Process-local batch store backed by a hash map
#[derive(Default)]
pub struct InMemoryBatchStore {
    batches: RwLock<HashMap<Uuid, Batch>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn save(&self, batch: Batch) {
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(batch.id, batch);
    }

    async fn find(&self, batch_id: Uuid) -> Option<Batch> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&batch_id)
            .cloned()
    }

    async fn find_all(&self) -> Vec<Batch> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchState;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_batch_is_none() {
        let store = InMemoryBatchStore::new();
        assert!(store.find(Uuid::now_v7()).await.is_none());
    }

    #[tokio::test]
    async fn test_save_then_find() {
        let store = InMemoryBatchStore::new();
        let batch = Batch::new(3);
        let id = batch.id;

        store.save(batch).await;

        let found = store.find(id).await.unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.total_roots, 3);
    }

    #[tokio::test]
    async fn test_save_upserts_latest_snapshot() {
        let store = InMemoryBatchStore::new();
        let mut batch = Batch::new(1);
        let id = batch.id;

        store.save(batch.clone()).await;
        batch.transition(BatchState::Running).unwrap();
        store.save(batch).await;

        assert_eq!(store.find(id).await.unwrap().state, BatchState::Running);
        assert_eq!(store.find_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_saves_of_distinct_batches() {
        let store = Arc::new(InMemoryBatchStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save(Batch::new(1)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.find_all().await.len(), 16);
    }
}
