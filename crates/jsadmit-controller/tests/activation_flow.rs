#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{bounded, pod, policy, wait_until, ChannelSource, FakeDiscovery};
use jsadmit_controller::app_state::AppState;
use jsadmit_controller::config::ControllerConfig;
use jsadmit_controller::watch::SourceEvent;
use serde_json::{json, Value};

const POD: &str = "v1/Pod";
const NS_POLICY: &str = "momiji.com/v1/JsAdmission";
const CLUSTER_POLICY: &str = "momiji.com/v1/ClusterJsAdmission";
const SETTLE: Duration = Duration::from_secs(10);

const TRACKER: &str = r#"
function init(state) { state.seen = ["init"]; }
function created(state, obj) { state.seen.push(obj.metadata.namespace + "/" + obj.metadata.name); }
function updated(state, obj, old) { state.seen.push("~" + obj.metadata.name + "@" + obj.metadata.resourceVersion); }
function deleted(state, obj) { state.seen.push("-" + obj.metadata.name); }
"#;

fn state_with(source: Arc<ChannelSource>) -> AppState {
    common::init_test_logging();
    AppState::new(
        ControllerConfig::default(),
        Arc::new(FakeDiscovery::standard()),
        source,
    )
}

fn seen(state: &AppState, ns: &str, name: &str) -> Vec<String> {
    let Some(unit) = state.registry().get(ns, name) else {
        return vec![];
    };
    match unit.runtime().state().get("seen") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => vec![],
    }
}

fn is_active(state: &AppState, ns: &str, name: &str) -> bool {
    state
        .registry()
        .get(ns, name)
        .is_some_and(|u| u.is_active())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_marks_ready_after_policy_sync() {
    let source = Arc::new(ChannelSource::default());
    let state = state_with(source.clone());
    assert!(!state.is_ready());

    bounded(state.start()).await.unwrap();
    assert!(state.is_ready());
    assert_eq!(source.subscriptions(NS_POLICY), 1);
    assert_eq!(source.subscriptions(CLUSTER_POLICY), 1);

    state.shutdown().await;
    assert!(!state.is_ready());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_fails_when_policy_resources_cannot_sync() {
    let source = Arc::new(ChannelSource::default());
    source.hold(CLUSTER_POLICY);
    let mut cfg = ControllerConfig::default();
    cfg.watch.sync_timeout_ms = 1000;
    common::init_test_logging();
    let state = AppState::new(cfg, Arc::new(FakeDiscovery::standard()), source);

    let err = bounded(state.start()).await.unwrap_err();
    assert_eq!(err.code().as_str(), "WATCH_SYNC");
    assert!(!state.is_ready());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn init_runs_before_namespace_backfill() {
    let source = Arc::new(ChannelSource::default());
    source.seed(
        POD,
        vec![pod("ns", "a", "1"), pod("ns", "b", "1"), pod("other", "c", "1")],
    );
    source.seed(NS_POLICY, vec![policy("ns", "tracker", &["pods"], TRACKER)]);
    let state = state_with(source.clone());

    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "ns", "tracker")).await);

    let mut seen = seen(&state, "ns", "tracker");
    assert_eq!(seen.first().map(String::as_str), Some("init"));
    seen[1..].sort();
    assert_eq!(seen, ["init", "ns/a", "ns/b"]);
    assert_eq!(source.subscriptions(POD), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cluster_policies_backfill_every_namespace() {
    let source = Arc::new(ChannelSource::default());
    source.seed(POD, vec![pod("ns", "a", "1"), pod("other", "c", "1")]);
    source.seed(CLUSTER_POLICY, vec![policy("", "audit", &["v1/pods"], TRACKER)]);
    let state = state_with(source.clone());

    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "", "audit")).await);

    let mut seen = seen(&state, "", "audit");
    seen[1..].sort();
    assert_eq!(seen, ["init", "ns/a", "other/c"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_events_reach_active_policies() {
    let source = Arc::new(ChannelSource::default());
    source.seed(NS_POLICY, vec![policy("ns", "tracker", &["pods"], TRACKER)]);
    let state = state_with(source.clone());
    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "ns", "tracker")).await);

    source.send(POD, SourceEvent::Applied(pod("other", "e", "1")));
    source.send(POD, SourceEvent::Applied(pod("ns", "d", "1")));
    source.send(POD, SourceEvent::Applied(pod("ns", "d", "2")));
    source.send(POD, SourceEvent::Deleted(pod("ns", "d", "2")));

    assert!(wait_until(SETTLE, || seen(&state, "ns", "tracker").len() == 4).await);
    assert_eq!(seen(&state, "ns", "tracker"), ["init", "ns/d", "~d@2", "-d"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unresolvable_kinds_leave_policy_unregistered() {
    let source = Arc::new(ChannelSource::default());
    let state = state_with(source.clone());
    bounded(state.start()).await.unwrap();

    source.send(
        NS_POLICY,
        SourceEvent::Applied(policy("ns", "broken", &["widgets"], TRACKER)),
    );
    // policy events are handled in order; once this one is active the
    // broken one has been processed
    source.send(
        NS_POLICY,
        SourceEvent::Applied(policy("ns", "fine", &["configmaps"], TRACKER)),
    );

    assert!(wait_until(SETTLE, || is_active(&state, "ns", "fine")).await);
    assert!(state.registry().get("ns", "broken").is_none());
    assert!(state.registry().find(POD, "ns").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn compile_errors_leave_policy_unregistered() {
    let source = Arc::new(ChannelSource::default());
    source.seed(NS_POLICY, vec![policy("ns", "p", &["pods"], TRACKER)]);
    let state = state_with(source.clone());
    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "ns", "p")).await);

    let mut broken = policy("ns", "p", &["pods"], "function init( {");
    broken["metadata"]["resourceVersion"] = json!("2");
    source.send(NS_POLICY, SourceEvent::Applied(broken));

    assert!(wait_until(SETTLE, || state.registry().get("ns", "p").is_none()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deleting_the_resource_removes_the_policy() {
    let source = Arc::new(ChannelSource::default());
    let doc = policy("ns", "tracker", &["pods"], TRACKER);
    source.seed(NS_POLICY, vec![doc.clone()]);
    let state = state_with(source.clone());
    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "ns", "tracker")).await);
    assert_eq!(state.registry().find(POD, "ns").len(), 1);

    source.send(NS_POLICY, SourceEvent::Deleted(doc));

    assert!(wait_until(SETTLE, || state.registry().is_empty()).await);
    assert!(state.registry().find(POD, "ns").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn redefinition_reinitializes_state() {
    let source = Arc::new(ChannelSource::default());
    source.seed(POD, vec![pod("ns", "a", "1")]);
    source.seed(NS_POLICY, vec![policy("ns", "tracker", &["pods"], TRACKER)]);
    let state = state_with(source.clone());
    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "ns", "tracker")).await);

    let first = state.registry().get("ns", "tracker").unwrap();
    let mut next = policy("ns", "tracker", &["pods"], &TRACKER.replace("\"init\"", "\"again\""));
    next["metadata"]["resourceVersion"] = json!("2");
    source.send(NS_POLICY, SourceEvent::Applied(next));

    assert!(
        wait_until(SETTLE, || {
            seen(&state, "ns", "tracker").first().map(String::as_str) == Some("again")
                && is_active(&state, "ns", "tracker")
        })
        .await
    );
    let second = state.registry().get("ns", "tracker").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(seen(&state, "ns", "tracker"), ["again", "ns/a"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn slow_top_level_code_leaves_async_workers_free() {
    let source = Arc::new(ChannelSource::default());
    let slow = format!("const t0 = Date.now();\nwhile (Date.now() - t0 < 1500) {{}}\n{TRACKER}");
    source.seed(NS_POLICY, vec![policy("ns", "slow", &["pods"], &slow)]);
    let state = state_with(source.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let ticker = tokio::spawn({
        let stop = Arc::clone(&stop);
        async move {
            let mut worst = Duration::ZERO;
            while !stop.load(Ordering::Relaxed) {
                let tick = Instant::now();
                tokio::time::sleep(Duration::from_millis(10)).await;
                worst = worst.max(tick.elapsed());
            }
            worst
        }
    });

    bounded(state.start()).await.unwrap();
    assert!(wait_until(SETTLE, || is_active(&state, "ns", "slow")).await);
    stop.store(true, Ordering::Relaxed);

    let worst = bounded(ticker).await.unwrap();
    assert!(
        worst < Duration::from_millis(750),
        "async worker stalled for {worst:?} while the policy compiled"
    );
    assert_eq!(seen(&state, "ns", "slow"), ["init"]);
}
