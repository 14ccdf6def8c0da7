#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{bounded, pod, pods, wait_until, ChannelSource, Recorder};
use jsadmit_controller::cache::ResourceCache;
use jsadmit_controller::watch::{ChangeType, ResourceWatcher, SourceEvent};

const POD: &str = "v1/Pod";
const SETTLE: Duration = Duration::from_secs(5);

struct Fixture {
    source: Arc<ChannelSource>,
    cache: Arc<ResourceCache>,
    recorder: Arc<Recorder>,
    watcher: ResourceWatcher,
}

fn fixture(sync_timeout: Duration) -> Fixture {
    common::init_test_logging();
    let source = Arc::new(ChannelSource::default());
    let cache = Arc::new(ResourceCache::new());
    let recorder = Arc::new(Recorder::default());
    let watcher = ResourceWatcher::new(
        source.clone(),
        cache.clone(),
        recorder.clone(),
        sync_timeout,
    );
    Fixture {
        source,
        cache,
        recorder,
        watcher,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initial_listing_is_cached_before_add_returns() {
    let f = fixture(Duration::from_secs(5));
    f.source
        .seed(POD, vec![pod("ns", "a", "1"), pod("ns", "b", "1"), pod("other", "c", "1")]);

    bounded(f.watcher.add(&pods())).await.unwrap();

    assert!(f.watcher.is_watching(&pods()).await);
    assert_eq!(f.cache.len(POD), 3);
    assert_eq!(f.cache.find(POD, "ns").len(), 2);
    assert!(wait_until(SETTLE, || f.recorder.len() == 3).await);
    assert!(f
        .recorder
        .events()
        .iter()
        .all(|(change, _)| *change == ChangeType::Created));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_changes_reach_cache_and_handler() {
    let f = fixture(Duration::from_secs(5));
    bounded(f.watcher.add(&pods())).await.unwrap();

    f.source.send(POD, SourceEvent::Applied(pod("ns", "a", "1")));
    f.source.send(POD, SourceEvent::Applied(pod("ns", "a", "2")));
    f.source.send(POD, SourceEvent::Deleted(pod("ns", "a", "2")));

    assert!(wait_until(SETTLE, || f.recorder.len() == 3).await);
    assert_eq!(
        f.recorder.events(),
        vec![
            (ChangeType::Created, "ns/a".to_string()),
            (ChangeType::Updated, "ns/a".to_string()),
            (ChangeType::Deleted, "ns/a".to_string()),
        ]
    );
    assert!(f.cache.get(POD, "ns", "a").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unchanged_resource_version_is_suppressed() {
    let f = fixture(Duration::from_secs(5));
    f.source.seed(POD, vec![pod("ns", "a", "7")]);
    bounded(f.watcher.add(&pods())).await.unwrap();

    f.source.send(POD, SourceEvent::Applied(pod("ns", "a", "7")));
    f.source.send(POD, SourceEvent::Applied(pod("ns", "marker", "1")));

    assert!(wait_until(SETTLE, || f.recorder.len() == 2).await);
    assert_eq!(
        f.recorder.events(),
        vec![
            (ChangeType::Created, "ns/a".to_string()),
            (ChangeType::Created, "ns/marker".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn relist_drops_vanished_objects() {
    let f = fixture(Duration::from_secs(5));
    f.source.seed(POD, vec![pod("ns", "keep", "1"), pod("ns", "gone", "1")]);
    bounded(f.watcher.add(&pods())).await.unwrap();
    assert!(wait_until(SETTLE, || f.recorder.len() == 2).await);

    f.source.send(
        POD,
        SourceEvent::Restarted(vec![pod("ns", "keep", "2"), pod("ns", "new", "1")]),
    );

    assert!(wait_until(SETTLE, || f.recorder.len() == 5).await);
    let tail = f.recorder.events()[2..].to_vec();
    assert!(tail.contains(&(ChangeType::Updated, "ns/keep".to_string())));
    assert!(tail.contains(&(ChangeType::Created, "ns/new".to_string())));
    assert!(tail.contains(&(ChangeType::Deleted, "ns/gone".to_string())));

    let mut keys = f.cache.keys(POD);
    keys.sort();
    assert_eq!(
        keys,
        vec![
            ("ns".to_string(), "keep".to_string()),
            ("ns".to_string(), "new".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn add_is_idempotent() {
    let f = fixture(Duration::from_secs(5));
    bounded(f.watcher.add(&pods())).await.unwrap();
    bounded(f.watcher.add(&pods())).await.unwrap();
    assert_eq!(f.source.subscriptions(POD), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_timeout_fails_and_allows_retry() {
    let f = fixture(Duration::from_millis(200));
    f.source.hold(POD);

    let err = bounded(f.watcher.add(&pods())).await.unwrap_err();
    assert_eq!(err.code().as_str(), "WATCH_SYNC");
    assert!(!f.watcher.is_watching(&pods()).await);

    f.source.release(POD);
    f.source.seed(POD, vec![pod("ns", "a", "1")]);
    bounded(f.watcher.add(&pods())).await.unwrap();
    assert!(f.watcher.is_watching(&pods()).await);
    assert_eq!(f.source.subscriptions(POD), 2);
    assert!(f.cache.get(POD, "ns", "a").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kind_lock_defers_events() {
    let f = fixture(Duration::from_secs(5));
    bounded(f.watcher.add(&pods())).await.unwrap();

    let guard = bounded(f.watcher.lock_resource(POD)).await;
    f.source.send(POD, SourceEvent::Applied(pod("ns", "late", "1")));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(f.cache.get(POD, "ns", "late").is_none());
    assert_eq!(f.recorder.len(), 0);

    drop(guard);
    assert!(wait_until(SETTLE, || f.recorder.len() == 1).await);
    assert!(f.cache.get(POD, "ns", "late").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_resources_dedups_kinds() {
    let f = fixture(Duration::from_secs(5));
    let guards = bounded(f.watcher.lock_resources(&[
        POD.to_string(),
        "v1/ConfigMap".to_string(),
        POD.to_string(),
    ]))
    .await;
    assert_eq!(guards.len(), 2);
    drop(guards);
    // both kinds are free again
    let again = bounded(f.watcher.lock_resources(&[POD.to_string()])).await;
    assert_eq!(again.len(), 1);
}
