//! `AdmissionRegistry`: policy units per namespace bucket.
//!
//! The empty namespace is the cluster bucket. Buckets are name-ordered maps,
//! which gives `find` its namespace-first, name-ascending order for free.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use jsadmit_core::error::Result;

use crate::obs::ControllerMetrics;
use crate::script::ScriptEngine;

use super::unit::{Policy, PolicyUnit};

#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    pub max_idle_interpreters: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            max_idle_interpreters: 8,
        }
    }
}

pub struct AdmissionRegistry {
    engine: Arc<dyn ScriptEngine>,
    settings: RegistrySettings,
    namespaces: DashMap<String, BTreeMap<String, Arc<PolicyUnit>>>,
    metrics: Arc<ControllerMetrics>,
}

impl AdmissionRegistry {
    pub fn new(engine: Arc<dyn ScriptEngine>, settings: RegistrySettings) -> Self {
        Self {
            engine,
            settings,
            namespaces: DashMap::new(),
            metrics: Arc::default(),
        }
    }

    /// Share `metrics` with every unit compiled from now on.
    pub fn with_metrics(mut self, metrics: Arc<ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Compile `policy` and install it inactive, replacing any unit under the
    /// same identity. A compile failure still removes the previous unit.
    pub fn upsert(&self, policy: Policy) -> Result<Arc<PolicyUnit>> {
        let (ns, name) = (policy.namespace.clone(), policy.name.clone());
        let compiled = PolicyUnit::compile(
            policy,
            Arc::clone(&self.engine),
            self.settings.max_idle_interpreters,
            Arc::clone(&self.metrics),
        );

        let mut bucket = self.namespaces.entry(ns.clone()).or_default();
        if bucket.remove(&name).is_some() {
            tracing::debug!(namespace = %ns, %name, "previous policy unit dropped");
        }
        match compiled {
            Ok(unit) => {
                let unit = Arc::new(unit);
                bucket.insert(name, Arc::clone(&unit));
                Ok(unit)
            }
            Err(e) => {
                if bucket.is_empty() {
                    drop(bucket);
                    self.namespaces.remove_if(&ns, |_, b| b.is_empty());
                }
                Err(e)
            }
        }
    }

    pub fn remove(&self, namespace: &str, name: &str) -> Option<Arc<PolicyUnit>> {
        let removed = {
            let mut bucket = self.namespaces.get_mut(namespace)?;
            bucket.remove(name)
        };
        self.namespaces.remove_if(namespace, |_, b| b.is_empty());
        if removed.is_some() {
            tracing::info!(%namespace, %name, "policy removed");
        }
        removed
    }

    /// Current unit of an identity, active or not.
    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<PolicyUnit>> {
        self.namespaces.get(namespace)?.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.namespaces.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active units interested in `kind_id` for an object in `namespace`:
    /// that namespace's units, then (for non-empty namespaces) cluster units,
    /// each group by ascending name.
    pub fn find(&self, kind_id: &str, namespace: &str) -> Vec<Arc<PolicyUnit>> {
        let mut out = self.collect(kind_id, namespace);
        if !namespace.is_empty() {
            out.extend(self.collect(kind_id, ""));
        }
        out
    }

    fn collect(&self, kind_id: &str, namespace: &str) -> Vec<Arc<PolicyUnit>> {
        self.namespaces
            .get(namespace)
            .map(|bucket| {
                bucket
                    .values()
                    .filter(|u| u.is_active() && u.policy().watches(kind_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
