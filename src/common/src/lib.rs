pub mod config;
pub mod pod;
pub mod store;

pub use config::{Configuration, NamespaceFilter, ReaperConfig};
pub use pod::{PodKey, PodPhase, PodSnapshot};
pub use store::{
    ChannelEventSource, EventSource, MemoryPodStore, PodLister, PodStore, StoreError, StoreResult,
};
