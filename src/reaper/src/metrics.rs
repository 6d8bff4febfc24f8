//! Deletion and preservation counters, partitioned by namespace.
//!
//! The counter names and the single `namespace` label are a fixed contract
//! with operational tooling and must not change.

use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("metrics initialization failed: {0}")]
pub struct MetricsError(#[from] prometheus::Error);

/// Counters for pod reaping outcomes. Cloning shares the underlying
/// atomics, so one instance can be handed to every reconciliation in
/// flight.
#[derive(Clone)]
pub struct PodMetrics {
    deleted_total: IntCounterVec,
    skipped_total: IntCounterVec,
}

impl PodMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let deleted_total = IntCounterVec::new(
            Opts::new(
                "evicted_pods_deleted_total",
                "Total number of evicted pods deleted",
            ),
            &["namespace"],
        )?;
        let skipped_total = IntCounterVec::new(
            Opts::new(
                "evicted_pods_skipped_total",
                "Total number of evicted pods skipped due to preserve annotation",
            ),
            &["namespace"],
        )?;

        Ok(Self {
            deleted_total,
            skipped_total,
        })
    }

    /// Register both counters with the given registry.
    pub fn register(&self, registry: &Registry) -> Result<(), MetricsError> {
        registry.register(Box::new(self.deleted_total.clone()))?;
        registry.register(Box::new(self.skipped_total.clone()))?;
        Ok(())
    }

    pub fn inc_deleted(&self, namespace: &str) {
        self.deleted_total.with_label_values(&[namespace]).inc();
    }

    pub fn inc_skipped(&self, namespace: &str) {
        self.skipped_total.with_label_values(&[namespace]).inc();
    }

    pub fn deleted_count(&self, namespace: &str) -> u64 {
        self.deleted_total.with_label_values(&[namespace]).get()
    }

    pub fn skipped_count(&self, namespace: &str) -> u64 {
        self.skipped_total.with_label_values(&[namespace]).get()
    }
}

/// Create a registry with the pod counters already registered.
pub fn create_registry() -> Result<(Arc<Registry>, PodMetrics), MetricsError> {
    let registry = Registry::new();
    let metrics = PodMetrics::new()?;
    metrics.register(&registry)?;
    Ok((Arc::new(registry), metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = PodMetrics::new().unwrap();
        assert_eq!(metrics.deleted_count("default"), 0);
        assert_eq!(metrics.skipped_count("default"), 0);
    }

    #[test]
    fn test_increments_are_partitioned_by_namespace() {
        let metrics = PodMetrics::new().unwrap();

        metrics.inc_deleted("default");
        metrics.inc_deleted("default");
        metrics.inc_deleted("kube-system");
        metrics.inc_skipped("monitoring");

        assert_eq!(metrics.deleted_count("default"), 2);
        assert_eq!(metrics.deleted_count("kube-system"), 1);
        assert_eq!(metrics.deleted_count("monitoring"), 0);
        assert_eq!(metrics.skipped_count("monitoring"), 1);
        assert_eq!(metrics.skipped_count("default"), 0);
    }

    #[test]
    fn test_register_exposes_both_counters() {
        let (registry, metrics) = create_registry().unwrap();
        metrics.inc_deleted("default");
        metrics.inc_skipped("default");

        let families = registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"evicted_pods_deleted_total"));
        assert!(names.contains(&"evicted_pods_skipped_total"));

        for family in &families {
            for metric in family.get_metric() {
                assert_eq!(metric.get_label().len(), 1);
                assert_eq!(metric.get_label()[0].get_name(), "namespace");
            }
        }
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let metrics = PodMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = PodMetrics::new().unwrap();
        let clone = metrics.clone();
        clone.inc_deleted("default");
        assert_eq!(metrics.deleted_count("default"), 1);
    }
}
