//! `PolicyActivation`: resolve, watch, lock, upsert, init, backfill,
//! activate, unlock.
//!
//! Kind locks are held from before the upsert until the unit is active, so
//! live events for those kinds wait for the backfill to finish and reach the
//! new unit through the registry afterwards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use jsadmit_core::error::{JsAdmitError, Result};
use jsadmit_core::protocol::ResourceKind;
use jsadmit_core::ObjectExt;

use crate::discovery::Discovery;
use crate::obs::ControllerMetrics;
use crate::registry::{AdmissionRegistry, Policy, PolicyUnit};
use crate::watch::{ChangeType, ResourceEventHandler, ResourceWatcher};

use super::policy_source::PolicyDefinition;

pub struct PolicyActivation {
    registry: Arc<AdmissionRegistry>,
    watcher: Arc<ResourceWatcher>,
    discovery: Arc<dyn Discovery>,
    timeout: Duration,
    metrics: Arc<ControllerMetrics>,
}

impl PolicyActivation {
    pub fn new(
        registry: Arc<AdmissionRegistry>,
        watcher: Arc<ResourceWatcher>,
        discovery: Arc<dyn Discovery>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            watcher,
            discovery,
            timeout,
            metrics: Arc::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register and activate `def`. Any failure leaves the identity without
    /// an active unit.
    pub async fn activate(&self, def: PolicyDefinition) -> Result<Arc<PolicyUnit>> {
        let full_name = def.full_name();

        let kinds = match self.resolve(&def).await {
            Ok(kinds) => kinds,
            Err(e) => {
                self.registry.remove(&def.namespace, &def.name);
                return Err(e);
            }
        };
        let mut kind_ids: Vec<String> = kinds.iter().map(ResourceKind::kind_id).collect();
        kind_ids.sort();
        kind_ids.dedup();
        tracing::info!(policy = %full_name, kinds = ?kind_ids, "activating policy");

        for kind in &kinds {
            if let Err(e) = self.watcher.add(kind).await {
                self.registry.remove(&def.namespace, &def.name);
                return Err(e);
            }
        }

        let _guards = self.watcher.lock_resources(&kind_ids).await;

        let cache = self.watcher.cache();
        let existing: Vec<Arc<Value>> = kind_ids
            .iter()
            .flat_map(|k| cache.find(k, &def.namespace))
            .collect();

        let policy = Policy {
            namespace: def.namespace.clone(),
            name: def.name.clone(),
            kinds: kind_ids.clone(),
            source: def.js,
            timeout: self.timeout,
        };
        // Compiling runs top-level script code.
        let registry = Arc::clone(&self.registry);
        let (unit, seeded) = tokio::task::spawn_blocking(
            move || -> Result<(Arc<PolicyUnit>, usize)> {
                let unit = registry.upsert(policy)?;
                unit.init()?;
                for obj in &existing {
                    unit.created(obj)?;
                }
                Ok((unit, existing.len()))
            },
        )
        .await
        .map_err(|e| JsAdmitError::Internal(format!("activation task failed: {e}")))??;

        unit.activate();
        tracing::info!(policy = %full_name, backfilled = seeded, "policy active");
        Ok(unit)
    }

    fn record(&self, outcome: &str) {
        self.metrics.activations.inc(&[("outcome", outcome)]);
    }

    async fn resolve(&self, def: &PolicyDefinition) -> Result<Vec<ResourceKind>> {
        let mut kinds = Vec::with_capacity(def.kinds.len());
        for declared in &def.kinds {
            kinds.push(self.discovery.resolve_resource(declared).await?);
        }
        Ok(kinds)
    }
}

#[async_trait]
impl ResourceEventHandler for PolicyActivation {
    async fn on_event(
        &self,
        kind: &ResourceKind,
        change: ChangeType,
        obj: Arc<Value>,
        _old: Option<Arc<Value>>,
    ) {
        if change == ChangeType::Deleted {
            if self.registry.remove(obj.namespace(), obj.name()).is_some() {
                self.record("removed");
            }
            return;
        }

        let def = match PolicyDefinition::from_object(&obj) {
            Ok(def) => def,
            Err(e) => {
                tracing::error!(resource = %kind, namespace = obj.namespace(), name = obj.name(), error = %e, "unreadable policy");
                self.registry.remove(obj.namespace(), obj.name());
                self.record("invalid");
                return;
            }
        };

        let full_name = def.full_name();
        match self.activate(def).await {
            Ok(_) => self.record("active"),
            Err(e) => {
                self.record("failed");
                tracing::error!(
                    policy = %full_name,
                    code = e.code().as_str(),
                    error = %e,
                    "policy activation failed"
                );
            }
        }
    }
}
