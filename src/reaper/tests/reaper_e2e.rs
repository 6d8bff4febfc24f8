//! End-to-end scenarios: event in, reconciliation, side effect, metrics out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::sleep;

use common::config::NamespaceFilter;
use common::pod::{PodKey, PodPhase, PodSnapshot};
use common::store::{ChannelEventSource, MemoryPodStore};
use reaper::controller::{Action, Reconciler};
use reaper::metrics::{PodMetrics, create_registry};
use reaper::runtime::{PollingEventSource, ReaperRuntime};
use reaper::{decision, http};

fn pod_with(
    namespace: &str,
    name: &str,
    phase: PodPhase,
    reason: &str,
    started_secs_ago: Option<i64>,
    annotations: &[(&str, &str)],
) -> PodSnapshot {
    PodSnapshot {
        namespace: namespace.to_string(),
        name: name.to_string(),
        phase,
        reason: reason.to_string(),
        start_time: started_secs_ago.map(|secs| Utc::now() - chrono::Duration::seconds(secs)),
        annotations: annotations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn evicted(namespace: &str, name: &str, started_secs_ago: i64) -> PodSnapshot {
    pod_with(
        namespace,
        name,
        PodPhase::Failed,
        "Evicted",
        Some(started_secs_ago),
        &[],
    )
}

struct Harness {
    store: Arc<MemoryPodStore>,
    metrics: PodMetrics,
    events_tx: tokio::sync::mpsc::Sender<PodKey>,
    shutdown_tx: watch::Sender<bool>,
    worker: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn start(ttl_seconds: i64) -> Self {
        let store = Arc::new(MemoryPodStore::new());
        let metrics = PodMetrics::new().unwrap();
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            metrics.clone(),
            ttl_seconds,
        ));
        let runtime = ReaperRuntime::new(reconciler);

        let (events_tx, events) = ChannelEventSource::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(async move { runtime.run(events, shutdown_rx).await });

        Self {
            store,
            metrics,
            events_tx,
            shutdown_tx,
            worker,
        }
    }

    async fn notify(&self, key: PodKey) {
        self.events_tx.send(key).await.unwrap();
    }

    async fn settle(&self) {
        sleep(Duration::from_millis(150)).await;
    }

    async fn stop(self) {
        self.shutdown_tx.send(true).unwrap();
        self.worker.await.unwrap();
    }
}

#[tokio::test]
async fn evicted_pod_is_deleted_and_counted() {
    let harness = Harness::start(300);
    harness.store.insert(evicted("default", "web-0", 600)).await;

    harness.notify(PodKey::new("default", "web-0")).await;
    harness.settle().await;

    assert!(!harness.store.contains(&PodKey::new("default", "web-0")).await);
    assert_eq!(harness.metrics.deleted_count("default"), 1);
    assert_eq!(harness.metrics.skipped_count("default"), 0);

    harness.stop().await;
}

#[tokio::test]
async fn preserved_pod_survives_and_is_counted_as_skipped() {
    let harness = Harness::start(300);
    harness
        .store
        .insert(pod_with(
            "default",
            "keep-me",
            PodPhase::Failed,
            "Evicted",
            Some(600),
            &[(decision::PRESERVE_ANNOTATION, "true")],
        ))
        .await;

    harness.notify(PodKey::new("default", "keep-me")).await;
    harness.settle().await;

    assert!(harness.store.contains(&PodKey::new("default", "keep-me")).await);
    assert_eq!(harness.metrics.skipped_count("default"), 1);
    assert_eq!(harness.metrics.deleted_count("default"), 0);

    harness.stop().await;
}

#[tokio::test]
async fn preserve_false_is_not_a_preservation() {
    let harness = Harness::start(300);
    harness
        .store
        .insert(pod_with(
            "default",
            "web-0",
            PodPhase::Failed,
            "Evicted",
            Some(600),
            &[(decision::PRESERVE_ANNOTATION, "false")],
        ))
        .await;

    harness.notify(PodKey::new("default", "web-0")).await;
    harness.settle().await;

    assert!(!harness.store.contains(&PodKey::new("default", "web-0")).await);
    assert_eq!(harness.metrics.deleted_count("default"), 1);
    assert_eq!(harness.metrics.skipped_count("default"), 0);

    harness.stop().await;
}

#[tokio::test]
async fn running_pod_is_left_alone() {
    let harness = Harness::start(300);
    harness
        .store
        .insert(pod_with(
            "default",
            "web-0",
            PodPhase::Running,
            "",
            Some(600),
            &[],
        ))
        .await;

    harness.notify(PodKey::new("default", "web-0")).await;
    harness.settle().await;

    assert!(harness.store.contains(&PodKey::new("default", "web-0")).await);
    assert_eq!(harness.metrics.deleted_count("default"), 0);
    assert_eq!(harness.metrics.skipped_count("default"), 0);

    harness.stop().await;
}

#[tokio::test]
async fn oomkilled_pod_is_left_alone() {
    let harness = Harness::start(300);
    harness
        .store
        .insert(pod_with(
            "default",
            "web-0",
            PodPhase::Failed,
            "OOMKilled",
            Some(600),
            &[],
        ))
        .await;

    harness.notify(PodKey::new("default", "web-0")).await;
    harness.settle().await;

    assert!(harness.store.contains(&PodKey::new("default", "web-0")).await);
    assert_eq!(harness.metrics.deleted_count("default"), 0);

    harness.stop().await;
}

#[tokio::test]
async fn young_evicted_pod_gets_a_requeue_directive() {
    let store = Arc::new(MemoryPodStore::new());
    store.insert(evicted("default", "young", 60)).await;
    let metrics = PodMetrics::new().unwrap();
    let reconciler = Reconciler::new(store.clone(), metrics.clone(), 300);

    let action = reconciler
        .reconcile(&PodKey::new("default", "young"))
        .await
        .unwrap();

    match action {
        Action::RequeueAfter(delay) => {
            assert!(delay > Duration::from_secs(230));
            assert!(delay <= Duration::from_secs(240));
        }
        other => panic!("expected requeue directive, got {other:?}"),
    }
    assert!(store.contains(&PodKey::new("default", "young")).await);
    assert_eq!(metrics.deleted_count("default"), 0);
}

#[tokio::test]
async fn pod_in_unwatched_namespace_is_never_enqueued() {
    let store = Arc::new(MemoryPodStore::new());
    store.insert(evicted("kube-system", "off-limits", 600)).await;
    store.insert(evicted("default", "in-scope", 600)).await;

    let metrics = PodMetrics::new().unwrap();
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        metrics.clone(),
        300,
    ));
    let runtime = ReaperRuntime::new(reconciler);

    let filter = NamespaceFilter::new(false, vec!["default".to_string()]);
    let source = PollingEventSource::new(store.clone(), filter, Duration::from_millis(20));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(async move { runtime.run(source, shutdown_rx).await });

    sleep(Duration::from_millis(300)).await;

    assert!(store.contains(&PodKey::new("kube-system", "off-limits")).await);
    assert!(!store.contains(&PodKey::new("default", "in-scope")).await);
    assert_eq!(metrics.deleted_count("default"), 1);
    assert_eq!(metrics.deleted_count("kube-system"), 0);

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text_format() {
    let (registry, metrics) = create_registry().unwrap();
    metrics.inc_deleted("default");
    metrics.inc_skipped("default");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(http::serve(listener, registry));

    let body = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("evicted_pods_deleted_total{namespace=\"default\"} 1"));
    assert!(body.contains("evicted_pods_skipped_total{namespace=\"default\"} 1"));

    server.abort();
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let (registry, _metrics) = create_registry().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(http::serve(listener, registry));

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    server.abort();
}
