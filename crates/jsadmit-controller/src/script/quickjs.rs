//! QuickJS-backed `ScriptEngine`.
//!
//! Each instance owns its own runtime and context, so nothing but the JSON
//! text of arguments ever crosses between calls or instances. Execution time
//! is bounded by a deadline polled from the runtime's interrupt handler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rquickjs::convert::Coerced;
use rquickjs::function::{Args, Rest};
use rquickjs::{CatchResultExt, Context, Ctx, Function, Runtime, Value};
use tracing::instrument;

use jsadmit_core::error::{JsAdmitError, Result};

use super::engine::{Invocation, ScriptEngine, ScriptInstance, ScriptLimits};
use super::hooks::Hook;
use super::host::{self, ScriptLevel};

#[derive(Debug, Clone, Default)]
pub struct QuickJsEngine {
    limits: ScriptLimits,
}

impl QuickJsEngine {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }
}

impl ScriptEngine for QuickJsEngine {
    fn load(&self, policy: &str, source: &str, timeout: Duration) -> Result<Box<dyn ScriptInstance>> {
        let instance = QuickJsInstance::new(policy, source, timeout, &self.limits)?;
        Ok(Box::new(instance))
    }
}

/// Per-call deadline, polled from the interrupt handler without locking.
///
/// Stored as nanoseconds since `base`, offset by one; zero means disarmed.
struct Deadline {
    base: Instant,
    at: AtomicU64,
}

impl Deadline {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            at: AtomicU64::new(0),
        }
    }

    fn arm(&self, timeout: Duration) {
        let at = self.elapsed_nanos().saturating_add(duration_nanos(timeout));
        self.at.store(at.saturating_add(1), Ordering::Release);
    }

    fn disarm(&self) {
        self.at.store(0, Ordering::Release);
    }

    fn expired(&self) -> bool {
        match self.at.load(Ordering::Acquire) {
            0 => false,
            at => self.elapsed_nanos() >= at - 1,
        }
    }

    fn elapsed_nanos(&self) -> u64 {
        duration_nanos(self.base.elapsed())
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

struct QuickJsInstance {
    policy: String,
    context: Context,
    runtime: Runtime,
    max_stack_bytes: usize,
    deadline: Arc<Deadline>,
    interrupted: Arc<AtomicBool>,
}

impl QuickJsInstance {
    #[instrument(level = "debug", skip(source, limits), fields(bytes = source.len()))]
    fn new(policy: &str, source: &str, timeout: Duration, limits: &ScriptLimits) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| JsAdmitError::Internal(format!("script runtime: {e}")))?;
        runtime.set_memory_limit(limits.max_memory_bytes);
        runtime.set_max_stack_size(limits.max_stack_bytes);

        let deadline = Arc::new(Deadline::new());
        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let deadline = Arc::clone(&deadline);
            let interrupted = Arc::clone(&interrupted);
            runtime.set_interrupt_handler(Some(Box::new(move || {
                let expired = deadline.expired();
                if expired {
                    interrupted.store(true, Ordering::Relaxed);
                }
                expired
            })));
        }

        let context = Context::full(&runtime)
            .map_err(|e| JsAdmitError::Internal(format!("script context: {e}")))?;

        let instance = Self {
            policy: policy.to_string(),
            context,
            runtime,
            max_stack_bytes: limits.max_stack_bytes,
            deadline,
            interrupted,
        };

        instance.arm(timeout);
        let loaded = instance.context.with(|ctx| -> std::result::Result<(), String> {
            install_host(&ctx, policy).map_err(|e| e.to_string())?;
            ctx.eval::<(), _>(source)
                .catch(&ctx)
                .map_err(|e| e.to_string())
        });
        instance.disarm();

        match loaded {
            Ok(()) => Ok(instance),
            Err(_) if instance.interrupted.load(Ordering::Relaxed) => {
                Err(JsAdmitError::ScriptCompile {
                    policy: policy.to_string(),
                    message: format!("top-level code exceeded {}ms", timeout.as_millis()),
                })
            }
            Err(message) => Err(JsAdmitError::ScriptCompile {
                policy: policy.to_string(),
                message,
            }),
        }
    }

    fn arm(&self, timeout: Duration) {
        // Instances move between blocking threads; re-applying the ceiling
        // re-anchors the stack limit on the current thread.
        self.runtime.set_max_stack_size(self.max_stack_bytes);
        self.interrupted.store(false, Ordering::Relaxed);
        self.deadline.arm(timeout);
    }

    fn disarm(&self) {
        self.deadline.disarm();
    }
}

impl ScriptInstance for QuickJsInstance {
    fn hook_source(&mut self, hook: Hook) -> Result<Option<String>> {
        self.context
            .with(|ctx| -> std::result::Result<Option<String>, String> {
                let value = lookup(&ctx, hook)?;
                if !value.is_function() {
                    return Ok(None);
                }
                let text: Coerced<String> = value.get().map_err(|e| e.to_string())?;
                Ok(Some(text.0))
            })
            .map_err(|message| JsAdmitError::ScriptCompile {
                policy: self.policy.clone(),
                message,
            })
    }

    fn invoke(
        &mut self,
        hook: Hook,
        args: &[Option<serde_json::Value>],
        state_slot: Option<usize>,
        timeout: Duration,
    ) -> Result<Invocation> {
        self.arm(timeout);
        let out = self.context.with(|ctx| -> std::result::Result<Invocation, String> {
            let func = lookup(&ctx, hook)?
                .into_function()
                .ok_or_else(|| format!("{hook} is not a function"))?;

            let mut js_args = Args::new(ctx.clone(), args.len());
            let mut state = None;
            for (i, arg) in args.iter().enumerate() {
                let v = match arg {
                    Some(json) => to_js(&ctx, json)?,
                    None => Value::new_undefined(ctx.clone()),
                };
                if state_slot == Some(i) {
                    state = Some(v.clone());
                }
                js_args.push_arg(v).map_err(|e| e.to_string())?;
            }

            let ret: Value = func
                .call_arg(js_args)
                .catch(&ctx)
                .map_err(|e| e.to_string())?;

            Ok(Invocation {
                result: from_js(&ctx, ret)?,
                state: match state {
                    Some(v) => from_js(&ctx, v)?,
                    None => None,
                },
            })
        });
        self.disarm();

        out.map_err(|message| {
            if self.interrupted.load(Ordering::Relaxed) {
                JsAdmitError::ScriptTimeout {
                    policy: self.policy.clone(),
                    hook: hook.name().to_string(),
                    timeout_ms: timeout.as_millis(),
                }
            } else {
                JsAdmitError::ScriptRuntime {
                    policy: self.policy.clone(),
                    hook: hook.name().to_string(),
                    message,
                }
            }
        })
    }
}

fn install_host(ctx: &Ctx<'_>, policy: &str) -> rquickjs::Result<()> {
    let policy = policy.to_string();
    let sink = Function::new(
        ctx.clone(),
        move |level: i32, formatted: bool, args: Rest<String>| {
            host::emit(&policy, ScriptLevel::from_code(level), formatted, args.0);
        },
    )?;
    ctx.globals().set(host::SINK_NAME, sink)?;
    ctx.eval::<(), _>(host::PRELUDE)
}

/// Resolve a hook by name, including `let`/`const` bindings that never
/// reach `globalThis`.
fn lookup<'js>(ctx: &Ctx<'js>, hook: Hook) -> std::result::Result<Value<'js>, String> {
    let name = hook.name();
    ctx.eval::<Value, _>(format!(
        "typeof {name} === \"function\" ? {name} : undefined"
    ))
    .catch(ctx)
    .map_err(|e| e.to_string())
}

fn to_js<'js>(ctx: &Ctx<'js>, json: &serde_json::Value) -> std::result::Result<Value<'js>, String> {
    let text = serde_json::to_string(json).map_err(|e| e.to_string())?;
    ctx.json_parse(text).catch(ctx).map_err(|e| e.to_string())
}

/// Deep-export a script value; undefined, null and functions become `None`.
fn from_js<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
) -> std::result::Result<Option<serde_json::Value>, String> {
    if value.is_undefined() || value.is_null() || value.is_function() {
        return Ok(None);
    }
    let Some(text) = ctx.json_stringify(value).catch(ctx).map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let text = text.to_string().map_err(|e| e.to_string())?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| format!("result is not JSON: {e}"))
}
