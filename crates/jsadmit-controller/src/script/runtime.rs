//! Per-policy script runtime.
//!
//! One compiled program, a pool of interpreter instances loaded with it, and
//! one canonical state value shared by every instance. State is copied into
//! the borrowed instance on entry and exported back on exit, so it does not
//! matter which instance serves a call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::info_span;

use jsadmit_core::error::{JsAdmitError, Result};
use jsadmit_core::protocol::Operation;

use crate::obs::ControllerMetrics;

use super::engine::{ScriptEngine, ScriptInstance};
use super::hooks::{Hook, HookSignature, Param};
use super::params::parameter_names;

/// Non-state arguments of a hook call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookArgs<'a> {
    pub obj: Option<&'a Value>,
    pub old: Option<&'a Value>,
    pub op: Option<Operation>,
}

impl<'a> HookArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn obj(mut self, obj: &'a Value) -> Self {
        self.obj = Some(obj);
        self
    }

    pub fn old(mut self, old: &'a Value) -> Self {
        self.old = Some(old);
        self
    }

    pub fn op(mut self, op: Operation) -> Self {
        self.op = Some(op);
        self
    }
}

pub struct ScriptRuntime {
    policy: String,
    source: Arc<str>,
    engine: Arc<dyn ScriptEngine>,
    hooks: HashMap<Hook, HookSignature>,
    pool: Mutex<Vec<Box<dyn ScriptInstance>>>,
    max_idle: usize,
    state: Mutex<Value>,
    lock: RwLock<()>,
    timeout: Duration,
    metrics: Arc<ControllerMetrics>,
}

impl ScriptRuntime {
    /// Load `source` once to validate it and introspect its hooks; that
    /// first instance seeds the pool.
    pub fn compile(
        engine: Arc<dyn ScriptEngine>,
        policy: &str,
        source: &str,
        timeout: Duration,
        max_idle: usize,
    ) -> Result<Self> {
        let mut first = engine.load(policy, source, timeout)?;

        let mut hooks = HashMap::new();
        for hook in Hook::ALL {
            if let Some(text) = first.hook_source(hook)? {
                let sig = HookSignature::bind(hook, &parameter_names(&text));
                tracing::debug!(%policy, %hook, params = ?sig.params, "hook declared");
                hooks.insert(hook, sig);
            }
        }

        Ok(Self {
            policy: policy.to_string(),
            source: Arc::from(source),
            engine,
            hooks,
            pool: Mutex::new(vec![first]),
            max_idle: max_idle.max(1),
            state: Mutex::new(Value::Object(Map::new())),
            lock: RwLock::new(()),
            timeout,
            metrics: Arc::default(),
        })
    }

    /// Record hook calls into `metrics` instead of a private registry.
    pub fn with_metrics(mut self, metrics: Arc<ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn has_hook(&self, hook: Hook) -> bool {
        self.hooks.contains_key(&hook)
    }

    pub fn signature(&self, hook: Hook) -> Option<&HookSignature> {
        self.hooks.get(&hook)
    }

    /// Current policy state.
    pub fn state(&self) -> Value {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    pub fn idle_instances(&self) -> usize {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run `hook`. Blocks the calling thread; `Ok(None)` when the script does
    /// not define the hook or the hook returned nothing.
    ///
    /// The policy's exclusive lock is held when `force_sync` is set or the
    /// hook declares `sync`; a shared lock when it only declares `state`.
    pub fn call(&self, hook: Hook, force_sync: bool, args: HookArgs<'_>) -> Result<Option<Value>> {
        let Some(sig) = self.hooks.get(&hook) else {
            return Ok(None);
        };

        let exclusive = force_sync || sig.declares(Param::Sync);
        let with_state = sig.declares(Param::State);
        let _exclusive = exclusive.then(|| self.lock.write().unwrap_or_else(PoisonError::into_inner));
        let _shared = (!exclusive && with_state)
            .then(|| self.lock.read().unwrap_or_else(PoisonError::into_inner));

        let values: Vec<Option<Value>> = sig
            .params
            .iter()
            .map(|p| match p {
                Some(Param::State) => Some(self.state()),
                Some(Param::Sync) => Some(Value::Bool(exclusive)),
                Some(Param::Obj) => args.obj.cloned(),
                Some(Param::Old) => args.old.cloned(),
                Some(Param::Op) => args.op.map(|op| Value::String(op.as_str().to_string())),
                None => None,
            })
            .collect();
        let state_slot = sig.position(Param::State);

        let span = info_span!("hook", policy = %self.policy, %hook, elapsed_ms = tracing::field::Empty);
        let _entered = span.enter();
        let started = Instant::now();

        let mut instance = self.borrow()?;
        let outcome = instance.invoke(hook, &values, state_slot, self.timeout);
        let elapsed = started.elapsed();
        span.record("elapsed_ms", elapsed.as_millis() as u64);

        let result = match &outcome {
            Ok(_) => "ok",
            Err(JsAdmitError::ScriptTimeout { .. }) => "timeout",
            Err(_) => "error",
        };
        self.metrics
            .hook_calls
            .inc(&[("hook", hook.name()), ("result", result)]);
        self.metrics
            .hook_duration
            .observe(&[("hook", hook.name())], elapsed);

        match outcome {
            Ok(inv) => {
                self.give_back(instance);
                if let Some(state) = inv.state {
                    *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
                }
                Ok(inv.result)
            }
            Err(e @ JsAdmitError::ScriptTimeout { .. }) => {
                tracing::warn!(error = %e, "interpreter discarded after timeout");
                Err(e)
            }
            Err(e) => {
                self.give_back(instance);
                Err(e)
            }
        }
    }

    fn borrow(&self) -> Result<Box<dyn ScriptInstance>> {
        let idle = self.pool.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match idle {
            Some(instance) => Ok(instance),
            None => {
                tracing::trace!(policy = %self.policy, "loading additional interpreter");
                self.engine.load(&self.policy, &self.source, self.timeout)
            }
        }
    }

    fn give_back(&self, instance: Box<dyn ScriptInstance>) {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.len() < self.max_idle {
            pool.push(instance);
        }
    }
}
