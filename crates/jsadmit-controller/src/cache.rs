//! In-memory index of the latest snapshot of every watched object.
//!
//! Keyed by canonical kind id, then namespace, then name. Snapshots are
//! stored behind `Arc` so `find` hands out a point-in-time list without
//! copying object trees or holding any shard lock.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

type ByName = HashMap<String, Arc<Value>>;

#[derive(Default)]
pub struct ResourceCache {
    kinds: DashMap<String, HashMap<String, ByName>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            kinds: DashMap::new(),
        }
    }

    /// Upsert a snapshot.
    pub fn add(&self, kind: &str, namespace: &str, name: &str, obj: Arc<Value>) {
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), obj);
    }

    /// Delete a snapshot, returning it when present.
    pub fn remove(&self, kind: &str, namespace: &str, name: &str) -> Option<Arc<Value>> {
        let mut by_ns = self.kinds.get_mut(kind)?;
        let names = by_ns.get_mut(namespace)?;
        let removed = names.remove(name);
        if names.is_empty() {
            by_ns.remove(namespace);
        }
        removed
    }

    pub fn get(&self, kind: &str, namespace: &str, name: &str) -> Option<Arc<Value>> {
        self.kinds
            .get(kind)?
            .get(namespace)?
            .get(name)
            .cloned()
    }

    /// Snapshots of `kind`. An empty `namespace` matches every namespace,
    /// anything else matches exactly.
    pub fn find(&self, kind: &str, namespace: &str) -> Vec<Arc<Value>> {
        let Some(by_ns) = self.kinds.get(kind) else {
            return vec![];
        };
        if namespace.is_empty() {
            by_ns.values().flat_map(|names| names.values().cloned()).collect()
        } else {
            by_ns
                .get(namespace)
                .map(|names| names.values().cloned().collect())
                .unwrap_or_default()
        }
    }

    /// `(namespace, name)` of every cached object of `kind`.
    pub fn keys(&self, kind: &str) -> Vec<(String, String)> {
        let Some(by_ns) = self.kinds.get(kind) else {
            return vec![];
        };
        by_ns
            .iter()
            .flat_map(|(ns, names)| names.keys().map(move |n| (ns.clone(), n.clone())))
            .collect()
    }

    pub fn len(&self, kind: &str) -> usize {
        self.kinds
            .get(kind)
            .map(|by_ns| by_ns.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, kind: &str) -> bool {
        self.len(kind) == 0
    }
}
