//! Context store with injectable failures.

use async_trait::async_trait;
use qap_core::store::{ContextStore, MemoryContextStore, StoreError, StoreResult};
use qap_protocol::run_models::RunContext;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Wraps a [`MemoryContextStore`], failing selected operations on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryContextStore,
    fail_save: AtomicBool,
    fail_load: AtomicBool,
    fail_delete: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Backend(format!("{operation} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContextStore for FlakyStore {
    async fn save(&self, ctx: &RunContext) -> StoreResult<()> {
        Self::check(&self.fail_save, "save")?;
        self.inner.save(ctx).await
    }

    async fn load(&self, run_id: Uuid) -> StoreResult<RunContext> {
        Self::check(&self.fail_load, "load")?;
        self.inner.load(run_id).await
    }

    async fn delete(&self, run_id: Uuid) -> StoreResult<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(run_id).await
    }
}
