//! `ResourceWatcher`: one live subscription per kind.
//!
//! Every event is applied under the kind lock: cache first, then the
//! handler. Activation takes the same locks around its backfill, so an
//! object is either seen by the backfill or delivered afterwards as a live
//! event, never both and never neither.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use jsadmit_core::error::{JsAdmitError, Result};
use jsadmit_core::object::same_resource_version;
use jsadmit_core::protocol::ResourceKind;
use jsadmit_core::ObjectExt;

use crate::cache::ResourceCache;
use crate::obs::ControllerMetrics;

use super::source::{ResourceSource, SourceEvent};
use super::{ChangeType, ResourceEventHandler};

struct Shared {
    cache: Arc<ResourceCache>,
    handler: Arc<dyn ResourceEventHandler>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Shared {
    async fn lock(&self, kind_id: &str) -> OwnedMutexGuard<()> {
        let m = self
            .locks
            .entry(kind_id.to_string())
            .or_default()
            .value()
            .clone();
        m.lock_owned().await
    }
}

pub struct ResourceWatcher {
    source: Arc<dyn ResourceSource>,
    shared: Arc<Shared>,
    subscriptions: Mutex<HashMap<String, JoinHandle<()>>>,
    sync_timeout: Duration,
    metrics: Arc<ControllerMetrics>,
}

impl ResourceWatcher {
    pub fn new(
        source: Arc<dyn ResourceSource>,
        cache: Arc<ResourceCache>,
        handler: Arc<dyn ResourceEventHandler>,
        sync_timeout: Duration,
    ) -> Self {
        Self {
            source,
            shared: Arc::new(Shared {
                cache,
                handler,
                locks: DashMap::new(),
            }),
            subscriptions: Mutex::new(HashMap::new()),
            sync_timeout,
            metrics: Arc::default(),
        }
    }

    /// Count delivered events into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache(&self) -> Arc<ResourceCache> {
        Arc::clone(&self.shared.cache)
    }

    /// Subscribe to `kind` unless already subscribed, and wait for the
    /// initial listing to land in the cache.
    pub async fn add(&self, kind: &ResourceKind) -> Result<()> {
        let id = kind.kind_id();
        let mut subs = self.subscriptions.lock().await;
        if subs.contains_key(&id) {
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let stream = self.source.subscribe(kind);
        let handle = tokio::spawn(run_subscription(
            Arc::clone(&self.shared),
            Arc::clone(&self.metrics),
            kind.clone(),
            stream,
            ready_tx,
        ));

        let failure = match tokio::time::timeout(self.sync_timeout, ready_rx).await {
            Ok(Ok(())) => None,
            Ok(Err(_)) => Some("subscription ended before initial sync".to_string()),
            Err(_) => Some(format!(
                "initial sync did not finish within {}ms",
                self.sync_timeout.as_millis()
            )),
        };

        if let Some(reason) = failure {
            handle.abort();
            tracing::error!(resource = %kind, %reason, "watch subscription failed");
            return Err(JsAdmitError::WatchSync {
                resource: kind.resource_id(),
                reason,
            });
        }

        subs.insert(id, handle);
        tracing::info!(
            resource = %kind,
            objects = self.shared.cache.len(&kind.kind_id()),
            "watch subscription synced"
        );
        Ok(())
    }

    pub async fn is_watching(&self, kind: &ResourceKind) -> bool {
        self.subscriptions.lock().await.contains_key(&kind.kind_id())
    }

    /// Kind-level mutual exclusion. Dropping the guard unlocks.
    pub async fn lock_resource(&self, kind_id: &str) -> OwnedMutexGuard<()> {
        self.shared.lock(kind_id).await
    }

    /// Lock several kinds in lexicographic order (duplicates locked once).
    pub async fn lock_resources(&self, kind_ids: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids: Vec<&String> = kind_ids.iter().collect();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.shared.lock(id).await);
        }
        guards
    }

    /// Stop every subscription.
    pub async fn shutdown(&self) {
        let mut subs = self.subscriptions.lock().await;
        for (kind, handle) in subs.drain() {
            handle.abort();
            tracing::debug!(%kind, "watch subscription stopped");
        }
    }
}

/// A cache change waiting to be handed to the event handler.
struct Pending {
    change: ChangeType,
    obj: Arc<Value>,
    old: Option<Arc<Value>>,
}

async fn run_subscription(
    shared: Arc<Shared>,
    metrics: Arc<ControllerMetrics>,
    kind: ResourceKind,
    mut stream: BoxStream<'static, Result<SourceEvent>>,
    ready: oneshot::Sender<()>,
) {
    let kind_id = kind.kind_id();
    let mut ready = Some(ready);

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!(resource = %kind, error = %e, "watch stream error");
                continue;
            }
        };

        let _guard = shared.lock(&kind_id).await;
        let pending: Vec<Pending> = match event {
            SourceEvent::Applied(obj) => stage_apply(&shared, &kind, obj).into_iter().collect(),
            SourceEvent::Deleted(obj) => vec![stage_delete(&shared, &kind, obj)],
            SourceEvent::Restarted(objs) => {
                let pending = stage_relist(&shared, &kind, objs);
                // Synced once the first listing is in the cache; handlers
                // for it still run under the lock below.
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
                pending
            }
        };

        for p in pending {
            metrics
                .watch_events
                .inc(&[("kind", kind_id.as_str()), ("change", p.change.as_str())]);
            shared.handler.on_event(&kind, p.change, p.obj, p.old).await;
        }
    }
    tracing::debug!(resource = %kind, "watch stream ended");
}

fn stage_apply(shared: &Shared, kind: &ResourceKind, obj: Value) -> Option<Pending> {
    let kind_id = kind.kind_id();
    let (ns, name) = (obj.namespace().to_string(), obj.name().to_string());
    if name.is_empty() {
        tracing::warn!(resource = %kind, "ignoring object without metadata.name");
        return None;
    }

    let old = shared.cache.get(&kind_id, &ns, &name);
    if let Some(prev) = &old {
        if same_resource_version(prev, &obj) {
            tracing::trace!(resource = %kind, namespace = %ns, %name, "unchanged resource version");
            return None;
        }
    }

    let obj = Arc::new(obj);
    shared.cache.add(&kind_id, &ns, &name, Arc::clone(&obj));
    let change = if old.is_some() {
        ChangeType::Updated
    } else {
        ChangeType::Created
    };
    tracing::trace!(resource = %kind, namespace = %ns, %name, change = change.as_str(), "object applied");
    Some(Pending { change, obj, old })
}

fn stage_delete(shared: &Shared, kind: &ResourceKind, obj: Value) -> Pending {
    let (ns, name) = (obj.namespace().to_string(), obj.name().to_string());
    shared.cache.remove(&kind.kind_id(), &ns, &name);
    tracing::trace!(resource = %kind, namespace = %ns, %name, "object deleted");
    Pending {
        change: ChangeType::Deleted,
        obj: Arc::new(obj),
        old: None,
    }
}

fn stage_relist(shared: &Shared, kind: &ResourceKind, objs: Vec<Value>) -> Vec<Pending> {
    let kind_id = kind.kind_id();
    let listed: HashSet<(String, String)> = objs
        .iter()
        .map(|o| (o.namespace().to_string(), o.name().to_string()))
        .collect();

    let mut pending: Vec<Pending> = objs
        .into_iter()
        .filter_map(|obj| stage_apply(shared, kind, obj))
        .collect();

    for (ns, name) in shared.cache.keys(&kind_id) {
        if listed.contains(&(ns.clone(), name.clone())) {
            continue;
        }
        if let Some(gone) = shared.cache.remove(&kind_id, &ns, &name) {
            tracing::debug!(resource = %kind, namespace = %ns, %name, "object vanished during relist");
            pending.push(Pending {
                change: ChangeType::Deleted,
                obj: gone,
                old: None,
            });
        }
    }
    pending
}
