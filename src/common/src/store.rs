//! Abstract collaborators supplied by the host platform.
//!
//! The reconciliation core only ever talks to the cluster through these
//! seams. Any target may substitute a polling loop, a push-based watch
//! stream, or a test double implementing the same operations.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::pod::{PodKey, PodSnapshot};

#[derive(Error, Debug)]
pub enum StoreError {
    /// The object disappeared between enqueue and processing. Expected, and
    /// resolved silently by the driver.
    #[error("pod {key} not found")]
    NotFound { key: PodKey },

    /// Transient backend failure. Surfaced unchanged; retry is the host
    /// framework's responsibility.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The backend aborted the call mid-flight.
    #[error("store operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read and delete access to pod objects by key.
#[async_trait]
pub trait PodStore: std::fmt::Debug + Send + Sync + 'static {
    /// Fetch the current snapshot for `key`.
    async fn get(&self, key: &PodKey) -> StoreResult<PodSnapshot>;

    /// Delete the object behind `key`.
    async fn delete(&self, key: &PodKey) -> StoreResult<()>;
}

/// Full listing, consumed only by the watch layer. The core never lists.
#[async_trait]
pub trait PodLister: std::fmt::Debug + Send + Sync + 'static {
    async fn list(&self) -> StoreResult<Vec<PodSnapshot>>;
}

/// Supplies keys whose underlying pod transitioned into a state of interest.
/// The coarse filter applied by a source is an optimization; the decision
/// engine re-validates the eviction condition itself.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Next enqueued key, or `None` once the source is exhausted.
    async fn next(&mut self) -> Option<PodKey>;
}

/// In-memory pod store backing tests and the standalone deployment mode.
#[derive(Debug, Default)]
pub struct MemoryPodStore {
    pods: Mutex<HashMap<PodKey, PodSnapshot>>,
}

impl MemoryPodStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, snapshot: PodSnapshot) {
        self.pods.lock().await.insert(snapshot.key(), snapshot);
    }

    pub async fn contains(&self, key: &PodKey) -> bool {
        self.pods.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.pods.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pods.lock().await.is_empty()
    }
}

#[async_trait]
impl PodStore for MemoryPodStore {
    async fn get(&self, key: &PodKey) -> StoreResult<PodSnapshot> {
        self.pods
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn delete(&self, key: &PodKey) -> StoreResult<()> {
        self.pods
            .lock()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }
}

#[async_trait]
impl PodLister for MemoryPodStore {
    async fn list(&self) -> StoreResult<Vec<PodSnapshot>> {
        Ok(self.pods.lock().await.values().cloned().collect())
    }
}

/// Push-based event source fed through an mpsc channel.
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<PodKey>,
}

impl ChannelEventSource {
    /// Create a source together with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<PodKey>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { receiver: rx })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next(&mut self) -> Option<PodKey> {
        self.receiver.recv().await
    }
}
