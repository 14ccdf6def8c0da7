//! Shared fakes and fixtures for controller integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use jsadmit_controller::discovery::{Catalog, CatalogEntry, Discovery};
use jsadmit_controller::watch::{ChangeType, ResourceEventHandler, ResourceSource, SourceEvent};
use jsadmit_core::error::{JsAdmitError, Result};
use jsadmit_core::protocol::{ResourceKind, ResourceQuery};
use jsadmit_core::ObjectExt;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn kind(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> ResourceKind {
    ResourceKind {
        group: group.into(),
        version: version.into(),
        kind: kind.into(),
        plural: plural.into(),
        namespaced,
    }
}

pub fn pods() -> ResourceKind {
    kind("", "v1", "Pod", "pods", true)
}

pub fn config_maps() -> ResourceKind {
    kind("", "v1", "ConfigMap", "configmaps", true)
}

pub fn namespaced_policies() -> ResourceKind {
    kind("momiji.com", "v1", "JsAdmission", "jsadmissions", true)
}

pub fn cluster_policies() -> ResourceKind {
    kind("momiji.com", "v1", "ClusterJsAdmission", "clusterjsadmissions", false)
}

pub fn pod(ns: &str, name: &str, rv: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"namespace": ns, "name": name, "resourceVersion": rv},
        "spec": {"containers": [{"name": "main", "image": "busybox"}]}
    })
}

pub fn policy(ns: &str, name: &str, kinds: &[&str], js: &str) -> Value {
    let mut metadata = json!({"name": name, "resourceVersion": "1"});
    if !ns.is_empty() {
        metadata.set_nested(&["namespace"], json!(ns));
    }
    json!({
        "apiVersion": "momiji.com/v1",
        "kind": if ns.is_empty() { "ClusterJsAdmission" } else { "JsAdmission" },
        "metadata": metadata,
        "spec": {"kinds": kinds, "js": js}
    })
}

/// Discovery over a fixed catalog.
pub struct FakeDiscovery {
    catalog: Catalog,
}

impl FakeDiscovery {
    pub fn new(kinds: Vec<ResourceKind>) -> Self {
        let entries = kinds
            .into_iter()
            .map(|kind| CatalogEntry { kind, preferred: true })
            .collect();
        Self {
            catalog: Catalog::new(entries),
        }
    }

    pub fn standard() -> Self {
        Self::new(vec![pods(), config_maps(), namespaced_policies(), cluster_policies()])
    }
}

#[async_trait]
impl Discovery for FakeDiscovery {
    async fn resolve_resource(&self, declared: &str) -> Result<ResourceKind> {
        self.catalog
            .resolve(&ResourceQuery::parse(declared))
            .ok_or_else(|| JsAdmitError::ResourceResolution {
                resource: declared.to_string(),
                reason: "not in test catalog".into(),
            })
    }
}

/// In-memory `ResourceSource` driven by the test.
///
/// Every subscription first receives the seeded listing (unless the kind is
/// held back), then whatever the test sends.
#[derive(Default)]
pub struct ChannelSource {
    seeds: Mutex<HashMap<String, Vec<Value>>>,
    held: Mutex<HashSet<String>>,
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<SourceEvent>>>,
    subscribed: Mutex<HashMap<String, usize>>,
}

impl ChannelSource {
    pub fn seed(&self, kind_id: &str, objects: Vec<Value>) {
        self.seeds.lock().unwrap().insert(kind_id.to_string(), objects);
    }

    /// Subscriptions to `kind_id` never deliver their initial listing.
    pub fn hold(&self, kind_id: &str) {
        self.held.lock().unwrap().insert(kind_id.to_string());
    }

    pub fn release(&self, kind_id: &str) {
        self.held.lock().unwrap().remove(kind_id);
    }

    pub fn send(&self, kind_id: &str, event: SourceEvent) {
        let senders = self.senders.lock().unwrap();
        let tx = senders.get(kind_id).expect("kind is not subscribed");
        tx.send(event).expect("subscription dropped");
    }

    pub fn subscriptions(&self, kind_id: &str) -> usize {
        self.subscribed.lock().unwrap().get(kind_id).copied().unwrap_or(0)
    }
}

impl ResourceSource for ChannelSource {
    fn subscribe(&self, kind: &ResourceKind) -> BoxStream<'static, Result<SourceEvent>> {
        let id = kind.kind_id();
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.held.lock().unwrap().contains(&id) {
            let seed = self.seeds.lock().unwrap().get(&id).cloned().unwrap_or_default();
            tx.send(SourceEvent::Restarted(seed)).unwrap();
        }
        self.senders.lock().unwrap().insert(id.clone(), tx);
        *self.subscribed.lock().unwrap().entry(id).or_default() += 1;

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|ev| (Ok(ev), rx))
        })
        .boxed()
    }
}

/// Records every event as `(change, "ns/name")`.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<(ChangeType, String)>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<(ChangeType, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl ResourceEventHandler for Recorder {
    async fn on_event(
        &self,
        _kind: &ResourceKind,
        change: ChangeType,
        obj: Arc<Value>,
        _old: Option<Arc<Value>>,
    ) {
        let key = format!("{}/{}", obj.namespace(), obj.name());
        self.events.lock().unwrap().push((change, key));
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Run `fut` with a generous upper bound so a hang fails instead of blocking.
pub async fn bounded<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(20), fut)
        .await
        .expect("test step timed out")
}
