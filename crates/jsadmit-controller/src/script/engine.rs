use std::time::Duration;

use jsadmit_core::error::Result;
use serde_json::Value;

use super::hooks::Hook;

/// Per-interpreter resource ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_memory_bytes: usize,
    pub max_stack_bytes: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024,
            max_stack_bytes: 1024 * 1024,
        }
    }
}

/// Outcome of one hook call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    /// Hook return value; `None` for undefined, null and functions.
    pub result: Option<Value>,
    /// Exported value of the state argument, when one was passed.
    pub state: Option<Value>,
}

/// Embeddable interpreter capability.
pub trait ScriptEngine: Send + Sync {
    /// Create a fresh interpreter with `source` loaded and its top-level
    /// code run (bounded by `timeout`). Fails with `ScriptCompile`.
    fn load(&self, policy: &str, source: &str, timeout: Duration) -> Result<Box<dyn ScriptInstance>>;
}

/// One loaded interpreter. Not shared: borrowed by one call at a time.
pub trait ScriptInstance: Send {
    /// Source text of `hook` when the script defines it as a function.
    fn hook_source(&mut self, hook: Hook) -> Result<Option<String>>;

    /// Call `hook` with positional JSON arguments (`None` is `undefined`).
    ///
    /// Arguments are deep-copied into the interpreter. When `state_slot`
    /// names an argument, its value after the call is exported back.
    /// Fails with `ScriptRuntime` or `ScriptTimeout`.
    fn invoke(
        &mut self,
        hook: Hook,
        args: &[Option<Value>],
        state_slot: Option<usize>,
        timeout: Duration,
    ) -> Result<Invocation>;
}
