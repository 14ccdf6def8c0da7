//! Controller config loader (strict parsing).

pub mod schema;

use std::fs;

use jsadmit_core::error::{JsAdmitError, Result};

pub use schema::{
    ControllerConfig, PoliciesSection, ScriptSection, ServerSection, WatchSection,
};

pub fn load_from_file(path: &str) -> Result<ControllerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| JsAdmitError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ControllerConfig> {
    let mut cfg: ControllerConfig = serde_yaml::from_str(s)
        .map_err(|e| JsAdmitError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    cfg.script.clamp_memory();
    Ok(cfg)
}

/// Load `path` when given, built-in defaults otherwise.
pub fn load(path: Option<&str>) -> Result<ControllerConfig> {
    match path {
        Some(p) => load_from_file(p),
        None => Ok(ControllerConfig::default()),
    }
}
