use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use jsadmit_core::error::Result;
use jsadmit_core::protocol::Operation;

use crate::obs::ControllerMetrics;
use crate::script::{Hook, HookArgs, ScriptEngine, ScriptRuntime};

/// A declared policy. `namespace` is empty for cluster policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub namespace: String,
    pub name: String,
    /// Canonical kind ids the policy reacts to.
    pub kinds: Vec<String>,
    pub source: String,
    pub timeout: Duration,
}

impl Policy {
    /// `namespace/name`, or `name` for cluster policies.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    pub fn watches(&self, kind_id: &str) -> bool {
        self.kinds.iter().any(|k| k == kind_id)
    }
}

/// Execution unit of one policy.
///
/// Lifecycle hooks always run exclusively and with the state channel.
pub struct PolicyUnit {
    policy: Policy,
    runtime: ScriptRuntime,
    active: AtomicBool,
}

impl PolicyUnit {
    pub fn compile(
        policy: Policy,
        engine: Arc<dyn ScriptEngine>,
        max_idle: usize,
        metrics: Arc<ControllerMetrics>,
    ) -> Result<Self> {
        let runtime = ScriptRuntime::compile(
            engine,
            &policy.full_name(),
            &policy.source,
            policy.timeout,
            max_idle,
        )?
        .with_metrics(metrics);
        Ok(Self {
            policy,
            runtime,
            active: AtomicBool::new(false),
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn full_name(&self) -> String {
        self.policy.full_name()
    }

    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn init(&self) -> Result<()> {
        self.runtime.call(Hook::Init, true, HookArgs::new()).map(drop)
    }

    pub fn created(&self, obj: &Value) -> Result<()> {
        self.runtime
            .call(Hook::Created, true, HookArgs::new().obj(obj))
            .map(drop)
    }

    pub fn updated(&self, obj: &Value, old: &Value) -> Result<()> {
        self.runtime
            .call(Hook::Updated, true, HookArgs::new().obj(obj).old(old))
            .map(drop)
    }

    pub fn deleted(&self, obj: &Value) -> Result<()> {
        self.runtime
            .call(Hook::Deleted, true, HookArgs::new().obj(obj))
            .map(drop)
    }

    pub fn mutate(&self, op: Operation, obj: &Value) -> Result<Option<Value>> {
        self.runtime
            .call(Hook::Mutate, true, HookArgs::new().obj(obj).op(op))
    }

    pub fn validate(&self, op: Operation, obj: &Value) -> Result<Option<Value>> {
        self.runtime
            .call(Hook::Validate, true, HookArgs::new().obj(obj).op(op))
    }
}
