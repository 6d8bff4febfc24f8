//! Eviction decision engine.
//!
//! A pure function from one pod snapshot, the configured TTL, and the
//! current time to a [`Decision`]. No I/O, no hidden state: repeated
//! evaluation with identical inputs yields identical decisions.

use std::time::Duration;

use chrono::{DateTime, Utc};

use common::pod::{PodPhase, PodSnapshot};

/// Annotation that exempts a pod from deletion when set to exactly `"true"`.
pub const PRESERVE_ANNOTATION: &str = "pod-reaper/preserve";

const EVICTED_REASON: &str = "Evicted";

/// Outcome of evaluating a single pod snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The pod is not in the eviction state of interest.
    Ignore,
    /// Evicted but annotated to be kept.
    Preserve,
    /// Evicted, not preserved, TTL elapsed.
    Delete,
    /// Evicted, not preserved, TTL still running; recheck after the delay.
    RequeueAfter(Duration),
}

/// Whether the pod qualifies for reaping at all: phase Failed with the
/// literal status reason "Evicted". Exact, case-sensitive.
pub fn is_evicted(pod: &PodSnapshot) -> bool {
    pod.phase == PodPhase::Failed && pod.reason == EVICTED_REASON
}

/// Whether the preserve annotation is set to exactly `"true"`. This is a
/// literal string comparison, not a boolean parse: `"True"` and `"1"` do
/// not preserve.
pub fn should_preserve(pod: &PodSnapshot) -> bool {
    pod.annotations
        .get(PRESERVE_ANNOTATION)
        .is_some_and(|value| value == "true")
}

/// Evaluate one snapshot against the configured TTL at time `now`.
pub fn evaluate(pod: &PodSnapshot, ttl_seconds: i64, now: DateTime<Utc>) -> Decision {
    if !is_evicted(pod) {
        return Decision::Ignore;
    }
    if should_preserve(pod) {
        return Decision::Preserve;
    }
    if ttl_seconds <= 0 {
        // A zero or negative TTL means the grace period is already over.
        return Decision::Delete;
    }
    let Some(start_time) = pod.start_time else {
        // No recorded start time counts as already past the TTL. Inherited
        // quirk: a pod is not expected to reach Failed/Evicted without ever
        // having started, but when it does, it is reaped immediately.
        return Decision::Delete;
    };

    let ttl = chrono::Duration::seconds(ttl_seconds);
    let age = now - start_time;
    if age >= ttl {
        return Decision::Delete;
    }
    Decision::RequeueAfter((ttl - age).to_std().unwrap_or_default())
}
