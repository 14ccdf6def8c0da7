//! Shared application state for the jsadmit controller.
//!
//! One service object owns the registry, both watchers and the discovery
//! client; HTTP handlers and event handlers reach them only through it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jsadmit_core::error::Result;

use crate::activation::PolicyActivation;
use crate::cache::ResourceCache;
use crate::config::ControllerConfig;
use crate::discovery::Discovery;
use crate::dispatch::LiveDispatcher;
use crate::obs::ControllerMetrics;
use crate::registry::{AdmissionRegistry, RegistrySettings};
use crate::script::{QuickJsEngine, ScriptEngine};
use crate::watch::{ResourceSource, ResourceWatcher};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ControllerConfig,
    registry: Arc<AdmissionRegistry>,
    /// Objects policies declared interest in.
    resources: Arc<ResourceWatcher>,
    /// Policy custom resources.
    policies: Arc<ResourceWatcher>,
    discovery: Arc<dyn Discovery>,
    metrics: Arc<ControllerMetrics>,
    ready: AtomicBool,
}

impl AppState {
    /// Wire the controller with the QuickJS engine.
    pub fn new(
        cfg: ControllerConfig,
        discovery: Arc<dyn Discovery>,
        source: Arc<dyn ResourceSource>,
    ) -> Self {
        let engine = Arc::new(QuickJsEngine::new(cfg.script.limits()));
        Self::with_engine(cfg, discovery, source, engine)
    }

    pub fn with_engine(
        cfg: ControllerConfig,
        discovery: Arc<dyn Discovery>,
        source: Arc<dyn ResourceSource>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        let metrics = Arc::new(ControllerMetrics::default());
        let registry = Arc::new(
            AdmissionRegistry::new(
                engine,
                RegistrySettings {
                    max_idle_interpreters: cfg.script.max_idle_interpreters,
                },
            )
            .with_metrics(Arc::clone(&metrics)),
        );

        let resources = Arc::new(
            ResourceWatcher::new(
                Arc::clone(&source),
                Arc::new(ResourceCache::new()),
                Arc::new(LiveDispatcher::new(Arc::clone(&registry))),
                cfg.watch.sync_timeout(),
            )
            .with_metrics(Arc::clone(&metrics)),
        );

        let activation = PolicyActivation::new(
            Arc::clone(&registry),
            Arc::clone(&resources),
            Arc::clone(&discovery),
            cfg.script.timeout(),
        )
        .with_metrics(Arc::clone(&metrics));
        let policies = Arc::new(
            ResourceWatcher::new(
                source,
                Arc::new(ResourceCache::new()),
                Arc::new(activation),
                cfg.watch.sync_timeout(),
            )
            .with_metrics(Arc::clone(&metrics)),
        );

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                resources,
                policies,
                discovery,
                metrics,
                ready: AtomicBool::new(false),
            }),
        }
    }

    /// Watch both policy resources. Fails when either cannot be resolved or
    /// synced.
    pub async fn start(&self) -> Result<()> {
        let p = &self.inner.cfg.policies;
        for declared in [p.cluster_id(), p.namespaced_id()] {
            let kind = self.inner.discovery.resolve_resource(&declared).await?;
            self.inner.policies.add(&kind).await?;
        }
        self.inner.ready.store(true, Ordering::Release);
        tracing::info!(policies = self.inner.registry.len(), "policy resources watched");
        Ok(())
    }

    /// Stop every subscription.
    pub async fn shutdown(&self) {
        self.inner.ready.store(false, Ordering::Release);
        self.inner.policies.shutdown().await;
        self.inner.resources.shutdown().await;
        tracing::info!("watch subscriptions stopped");
    }

    pub fn cfg(&self) -> &ControllerConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<AdmissionRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn resources(&self) -> Arc<ResourceWatcher> {
        Arc::clone(&self.inner.resources)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> Arc<ControllerMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Point-in-time gauges rendered next to the counters.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("jsadmit_policies_registered", self.inner.registry.len() as u64),
            ("jsadmit_ready", u64::from(self.is_ready())),
        ]
    }
}
