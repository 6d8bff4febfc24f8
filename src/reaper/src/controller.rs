//! Reconciliation driver.
//!
//! Receives one object key per change notification, fetches the current
//! snapshot, asks the decision engine what to do, performs the side effect,
//! and hands a scheduling directive back to the surrounding runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use common::pod::PodKey;
use common::store::{PodStore, StoreResult};

use crate::decision::{self, Decision};
use crate::metrics::PodMetrics;

/// Scheduling directive returned to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing further to do for this key.
    None,
    /// Re-invoke reconciliation for the same key after the delay.
    RequeueAfter(Duration),
}

/// Reconciles a single pod key per invocation. Safe to invoke concurrently
/// for distinct keys; holds no per-key state.
pub struct Reconciler {
    store: Arc<dyn PodStore>,
    metrics: PodMetrics,
    ttl_seconds: i64,
}

impl Reconciler {
    pub fn new(store: Arc<dyn PodStore>, metrics: PodMetrics, ttl_seconds: i64) -> Self {
        Self {
            store,
            metrics,
            ttl_seconds,
        }
    }

    /// Run one reconciliation for `key`. Fails only on transient store
    /// errors; retry with backoff is the caller's responsibility.
    pub async fn reconcile(&self, key: &PodKey) -> StoreResult<Action> {
        let pod = match self.store.get(key).await {
            Ok(pod) => pod,
            Err(err) if err.is_not_found() => {
                // The object vanished between enqueue and processing.
                debug!(key = %key, "pod no longer exists, nothing to do");
                return Ok(Action::None);
            }
            Err(err) => {
                warn!(key = %key, error = %err, "unable to fetch pod");
                return Err(err);
            }
        };

        match decision::evaluate(&pod, self.ttl_seconds, Utc::now()) {
            Decision::Ignore => {
                debug!(
                    key = %key,
                    phase = %pod.phase,
                    reason = %pod.reason,
                    "pod is not evicted, skipping"
                );
                Ok(Action::None)
            }
            Decision::Preserve => {
                info!(key = %key, "pod has preserve annotation, skipping deletion");
                self.metrics.inc_skipped(&pod.namespace);
                Ok(Action::None)
            }
            Decision::RequeueAfter(delay) => {
                info!(key = %key, requeue_after = ?delay, "pod has not exceeded TTL, requeuing");
                Ok(Action::RequeueAfter(delay))
            }
            Decision::Delete => {
                info!(key = %key, "deleting evicted pod");
                if let Err(err) = self.store.delete(key).await {
                    warn!(key = %key, error = %err, "unable to delete pod");
                    return Err(err);
                }
                // Only count once the store confirmed the delete.
                self.metrics.inc_deleted(&pod.namespace);
                info!(key = %key, "successfully deleted evicted pod");
                Ok(Action::None)
            }
        }
    }
}
