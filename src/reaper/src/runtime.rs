//! Minimal host runtime: work queue, requeue timers, and the built-in
//! polling event source.
//!
//! Stands in for the watch/notify framework a cluster platform would
//! provide. A single worker drains the queue, which gives the
//! at-most-one-in-flight-per-key guarantee; requeue directives become
//! spawned timers that feed the key back into the queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tracing::{info, warn};

use common::config::NamespaceFilter;
use common::pod::{PodKey, PodPhase, PodSnapshot};
use common::store::{EventSource, PodLister};

use crate::controller::{Action, Reconciler};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Coarse predicate applied before a key is enqueued. An optimization, not
/// a correctness boundary: the decision engine re-validates the eviction
/// condition because filter and engine may observe the object at different
/// times.
pub fn failed_phase_predicate(pod: &PodSnapshot) -> bool {
    pod.phase == PodPhase::Failed
}

/// Event source that lists the store on an interval and enqueues the keys
/// of Failed pods in watched namespaces.
pub struct PollingEventSource {
    lister: Arc<dyn PodLister>,
    filter: NamespaceFilter,
    poll_interval: Duration,
    ticker: Option<tokio::time::Interval>,
    pending: VecDeque<PodKey>,
}

impl PollingEventSource {
    pub fn new(lister: Arc<dyn PodLister>, filter: NamespaceFilter, poll_interval: Duration) -> Self {
        Self {
            lister,
            filter,
            poll_interval,
            ticker: None,
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl EventSource for PollingEventSource {
    async fn next(&mut self) -> Option<PodKey> {
        // The interval is created lazily so construction works outside a
        // runtime context.
        if self.ticker.is_none() {
            self.ticker = Some(interval(self.poll_interval));
        }
        loop {
            if let Some(key) = self.pending.pop_front() {
                return Some(key);
            }
            if let Some(ticker) = self.ticker.as_mut() {
                ticker.tick().await;
            }
            match self.lister.list().await {
                Ok(pods) => self.pending.extend(
                    pods.iter()
                        .filter(|pod| failed_phase_predicate(pod))
                        .filter(|pod| self.filter.allows(&pod.namespace))
                        .map(PodSnapshot::key),
                ),
                Err(err) => warn!(error = %err, "failed to list pods for watch cycle"),
            }
        }
    }
}

/// Drives reconciliations from an event source until shutdown.
pub struct ReaperRuntime {
    reconciler: Arc<Reconciler>,
    retry_backoff: Duration,
}

impl ReaperRuntime {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Drain events until the source closes or the shutdown signal flips.
    /// An in-flight reconciliation is dropped on shutdown; store futures
    /// are cancel-safe and no metric is recorded for an aborted delete.
    pub async fn run<E: EventSource>(&self, mut events: E, mut shutdown: watch::Receiver<bool>) {
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<PodKey>();

        loop {
            let key = tokio::select! {
                _ = shutdown.changed() => break,
                key = events.next() => match key {
                    Some(key) => key,
                    None => break,
                },
                // The runtime holds a sender, so recv() never yields None.
                key = requeue_rx.recv() => match key {
                    Some(key) => key,
                    None => break,
                },
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = self.step(key, &requeue_tx) => {}
            }
        }

        info!("reaper runtime stopped");
    }

    async fn step(&self, key: PodKey, requeue_tx: &mpsc::UnboundedSender<PodKey>) {
        match self.reconciler.reconcile(&key).await {
            Ok(Action::None) => {}
            Ok(Action::RequeueAfter(delay)) => {
                let tx = requeue_tx.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = tx.send(key);
                });
            }
            Err(err) => {
                warn!(key = %key, error = %err, "reconcile failed, scheduling retry");
                let tx = requeue_tx.clone();
                let backoff = self.retry_backoff;
                tokio::spawn(async move {
                    sleep(backoff).await;
                    let _ = tx.send(key);
                });
            }
        }
    }
}
