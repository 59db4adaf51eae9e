//! Per-owner retry counters and the backoff policy.

use qap_protocol::config_models::GlobalConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Retry limit and exponential backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transient failures tolerated per step before the run is torn down.
    pub max_retries: u32,

    /// Delay before the first retry; each further retry doubles it.
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: GlobalConfig::DEFAULT_MAX_RETRIES,
            base: Duration::from_millis(GlobalConfig::DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration) -> Self {
        Self { max_retries, base }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    /// Delay before retry number `attempt`, counted from 0.
    ///
    /// `base * 2^attempt`, saturating instead of overflowing.
    pub fn next_backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// Whether a step with `attempt` recorded failures may be retried again.
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Counts transient failures per owner and step name.
///
/// Process-local: counters do not survive a restart. The persisted cursor is
/// the recovery point, so a restarted process simply grants a fresh budget.
#[derive(Debug, Default)]
pub struct RetryTracker {
    counts: Mutex<HashMap<String, HashMap<String, u32>>>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures recorded so far, 0 if the step has never failed.
    pub async fn attempts_so_far(&self, owner: &str, step_name: &str) -> u32 {
        self.counts
            .lock()
            .await
            .get(owner)
            .and_then(|steps| steps.get(step_name))
            .copied()
            .unwrap_or(0)
    }

    /// Record one more failure and return the new count.
    pub async fn record_failure(&self, owner: &str, step_name: &str) -> u32 {
        let mut counts = self.counts.lock().await;
        let count = counts
            .entry(owner.to_string())
            .or_default()
            .entry(step_name.to_string())
            .or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget the counter for one step.
    pub async fn reset(&self, owner: &str, step_name: &str) {
        let mut counts = self.counts.lock().await;
        if let Some(steps) = counts.get_mut(owner) {
            steps.remove(step_name);
            if steps.is_empty() {
                counts.remove(owner);
            }
        }
    }

    /// Forget every counter held for an owner.
    pub async fn clear(&self, owner: &str) {
        self.counts.lock().await.remove(owner);
    }
}
