//! In-memory context store.

use super::{ContextStore, StoreError, StoreResult};
use async_trait::async_trait;
use qap_protocol::run_models::RunContext;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Keeps serialized contexts in a process-local map.
///
/// Contexts are stored as JSON text rather than as values so that loading
/// goes through the same round-trip as a durable backend.
#[derive(Debug, Default)]
pub struct MemoryContextStore {
    documents: Mutex<HashMap<Uuid, String>>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs currently stored.
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }

    pub async fn contains(&self, run_id: Uuid) -> bool {
        self.documents.lock().await.contains_key(&run_id)
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn save(&self, ctx: &RunContext) -> StoreResult<()> {
        let document = serde_json::to_string(ctx).map_err(|source| StoreError::Serialization {
            run_id: ctx.run_id,
            source,
        })?;
        self.documents.lock().await.insert(ctx.run_id, document);
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> StoreResult<RunContext> {
        let documents = self.documents.lock().await;
        let document = documents.get(&run_id).ok_or(StoreError::NotFound(run_id))?;
        serde_json::from_str(document).map_err(|source| StoreError::Serialization { run_id, source })
    }

    async fn delete(&self, run_id: Uuid) -> StoreResult<()> {
        self.documents.lock().await.remove(&run_id);
        Ok(())
    }
}
