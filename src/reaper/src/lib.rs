pub mod controller;
pub mod decision;
pub mod http;
pub mod metrics;
pub mod runtime;

pub use controller::{Action, Reconciler};
pub use decision::{Decision, PRESERVE_ANNOTATION, evaluate};
pub use metrics::{PodMetrics, create_registry};
pub use runtime::{PollingEventSource, ReaperRuntime};
