//! Sandboxed policy scripts.
//!
//! - `hooks`: lifecycle hook names, logical parameters and signatures.
//! - `params`: parameter-list extraction from function source text.
//! - `engine`: the pluggable engine/instance capability.
//! - `quickjs`: QuickJS-backed engine.
//! - `host`: host utilities bound into every interpreter (logging).
//! - `runtime`: `ScriptRuntime`, the per-policy pool + state + lock.

pub mod engine;
pub mod hooks;
pub mod host;
pub mod params;
pub mod quickjs;
pub mod runtime;

pub use engine::{Invocation, ScriptEngine, ScriptInstance, ScriptLimits};
pub use hooks::{Hook, HookSignature, Param};
pub use quickjs::QuickJsEngine;
pub use runtime::{HookArgs, ScriptRuntime};
