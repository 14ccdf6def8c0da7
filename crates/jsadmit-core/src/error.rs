//! Shared error type across jsadmit crates.

use thiserror::Error;

/// Stable error codes (used in logs and asserted by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Script failed to parse or its top-level code threw.
    ScriptCompile,
    /// A hook threw an exception.
    ScriptRuntime,
    /// A hook exceeded its execution timeout.
    ScriptTimeout,
    /// A declared resource kind is unknown to the cluster.
    ResourceResolution,
    /// A watch subscription could not sync.
    WatchSync,
    /// An inbound admission review could not be decoded.
    RequestDecode,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config schema version.
    UnsupportedVersion,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ScriptCompile => "SCRIPT_COMPILE",
            ErrorCode::ScriptRuntime => "SCRIPT_RUNTIME",
            ErrorCode::ScriptTimeout => "SCRIPT_TIMEOUT",
            ErrorCode::ResourceResolution => "RESOURCE_RESOLUTION",
            ErrorCode::WatchSync => "WATCH_SYNC",
            ErrorCode::RequestDecode => "REQUEST_DECODE",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, JsAdmitError>;

/// Unified error type used by core and controller.
#[derive(Debug, Error)]
pub enum JsAdmitError {
    #[error("script compile failed ({policy}): {message}")]
    ScriptCompile { policy: String, message: String },
    #[error("script error in {policy}.{hook}: {message}")]
    ScriptRuntime {
        policy: String,
        hook: String,
        message: String,
    },
    #[error("script timeout in {policy}.{hook} after {timeout_ms}ms")]
    ScriptTimeout {
        policy: String,
        hook: String,
        timeout_ms: u128,
    },
    #[error("unable to resolve resource {resource}: {reason}")]
    ResourceResolution { resource: String, reason: String },
    #[error("failed loading resources {resource}: {reason}")]
    WatchSync { resource: String, reason: String },
    #[error("request could not be decoded: {0}")]
    RequestDecode(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl JsAdmitError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            JsAdmitError::ScriptCompile { .. } => ErrorCode::ScriptCompile,
            JsAdmitError::ScriptRuntime { .. } => ErrorCode::ScriptRuntime,
            JsAdmitError::ScriptTimeout { .. } => ErrorCode::ScriptTimeout,
            JsAdmitError::ResourceResolution { .. } => ErrorCode::ResourceResolution,
            JsAdmitError::WatchSync { .. } => ErrorCode::WatchSync,
            JsAdmitError::RequestDecode(_) => ErrorCode::RequestDecode,
            JsAdmitError::BadConfig(_) => ErrorCode::BadConfig,
            JsAdmitError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            JsAdmitError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// True for hook failures (exception or timeout).
    pub fn is_script_failure(&self) -> bool {
        matches!(
            self,
            JsAdmitError::ScriptRuntime { .. } | JsAdmitError::ScriptTimeout { .. }
        )
    }
}
