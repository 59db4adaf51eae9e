//! Owner to run bindings.

use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Maps an external owner key (a chat or session id) to its active run.
///
/// Each owner has at most one bound run. Bindings are process-local.
#[derive(Debug, Default)]
pub struct RunRegistry {
    bindings: Mutex<HashMap<String, Uuid>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `run_id` to `owner` unless the owner is bound to another run.
    ///
    /// Returns `true` when the owner was free or already bound to `run_id`.
    pub async fn try_bind(&self, owner: &str, run_id: Uuid) -> bool {
        self.claim(owner, run_id).await.is_ok()
    }

    /// Like [`try_bind`](Self::try_bind), but reports the run holding the
    /// owner on conflict.
    pub async fn claim(&self, owner: &str, run_id: Uuid) -> Result<(), Uuid> {
        let mut bindings = self.bindings.lock().await;
        match bindings.get(owner) {
            Some(existing) if *existing == run_id => Ok(()),
            Some(existing) => Err(*existing),
            None => {
                bindings.insert(owner.to_string(), run_id);
                Ok(())
            }
        }
    }

    /// Bind `run_id` to `owner`, returning the run it replaces, if any.
    pub async fn bind(&self, owner: &str, run_id: Uuid) -> Option<Uuid> {
        self.bindings
            .lock()
            .await
            .insert(owner.to_string(), run_id)
            .filter(|previous| *previous != run_id)
    }

    /// Remove the owner's binding, returning the run it pointed at.
    pub async fn unbind(&self, owner: &str) -> Option<Uuid> {
        self.bindings.lock().await.remove(owner)
    }

    /// Remove the owner's binding only if it points at `run_id`.
    pub async fn unbind_if(&self, owner: &str, run_id: Uuid) -> bool {
        let mut bindings = self.bindings.lock().await;
        if bindings.get(owner) == Some(&run_id) {
            bindings.remove(owner);
            true
        } else {
            false
        }
    }

    pub async fn get(&self, owner: &str) -> Option<Uuid> {
        self.bindings.lock().await.get(owner).copied()
    }

    pub async fn len(&self) -> usize {
        self.bindings.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.lock().await.is_empty()
    }
}
