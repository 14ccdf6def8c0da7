use std::time::Duration;

use serde::Deserialize;
use jsadmit_core::error::{JsAdmitError, Result};

use crate::script::ScriptLimits;

const MIN_MEMORY_BYTES: usize = 1024 * 1024;
const MAX_MEMORY_BYTES: usize = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub script: ScriptSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub policies: PoliciesSection,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            script: ScriptSection::default(),
            watch: WatchSection::default(),
            policies: PoliciesSection::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(JsAdmitError::UnsupportedVersion);
        }
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(JsAdmitError::BadConfig(format!(
                "server.listen is not a socket address: {}",
                self.server.listen
            )));
        }
        self.script.validate()?;
        self.watch.validate()?;
        self.policies.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8043".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSection {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: usize,

    #[serde(default = "default_max_stack_bytes")]
    pub max_stack_bytes: usize,

    #[serde(default = "default_max_idle_interpreters")]
    pub max_idle_interpreters: usize,
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_memory_bytes: default_max_memory_bytes(),
            max_stack_bytes: default_max_stack_bytes(),
            max_idle_interpreters: default_max_idle_interpreters(),
        }
    }
}

impl ScriptSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600_000).contains(&self.timeout_ms) {
            return Err(JsAdmitError::BadConfig(
                "script.timeout_ms must be between 100 and 600000".into(),
            ));
        }
        if !(1..=256).contains(&self.max_idle_interpreters) {
            return Err(JsAdmitError::BadConfig(
                "script.max_idle_interpreters must be between 1 and 256".into(),
            ));
        }
        if self.max_stack_bytes < 64 * 1024 {
            return Err(JsAdmitError::BadConfig(
                "script.max_stack_bytes must be at least 65536".into(),
            ));
        }
        Ok(())
    }

    /// Cap the interpreter heap to sane bounds instead of failing startup.
    pub fn clamp_memory(&mut self) {
        let requested = self.max_memory_bytes;
        let clamped = requested.clamp(MIN_MEMORY_BYTES, MAX_MEMORY_BYTES);
        if clamped != requested {
            tracing::warn!(
                requested,
                clamped,
                "script.max_memory_bytes out of range, clamping"
            );
            self.max_memory_bytes = clamped;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_memory_bytes: self.max_memory_bytes,
            max_stack_bytes: self.max_stack_bytes,
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_max_memory_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_max_stack_bytes() -> usize {
    1024 * 1024
}
fn default_max_idle_interpreters() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

impl WatchSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=600_000).contains(&self.sync_timeout_ms) {
            return Err(JsAdmitError::BadConfig(
                "watch.sync_timeout_ms must be between 1000 and 600000".into(),
            ));
        }
        Ok(())
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }
}

fn default_sync_timeout_ms() -> u64 {
    60_000
}

/// Where policies are declared.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoliciesSection {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_namespaced_resource")]
    pub namespaced_resource: String,
    #[serde(default = "default_cluster_resource")]
    pub cluster_resource: String,
    #[serde(default = "default_mutate_annotation")]
    pub mutate_annotation: String,
}

impl Default for PoliciesSection {
    fn default() -> Self {
        Self {
            group: default_group(),
            version: default_version(),
            namespaced_resource: default_namespaced_resource(),
            cluster_resource: default_cluster_resource(),
            mutate_annotation: default_mutate_annotation(),
        }
    }
}

impl PoliciesSection {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("policies.group", &self.group),
            ("policies.version", &self.version),
            ("policies.namespaced_resource", &self.namespaced_resource),
            ("policies.cluster_resource", &self.cluster_resource),
            ("policies.mutate_annotation", &self.mutate_annotation),
        ] {
            if value.trim().is_empty() {
                return Err(JsAdmitError::BadConfig(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// `group/version/resource` of the namespaced policy resource.
    pub fn namespaced_id(&self) -> String {
        format!("{}/{}/{}", self.group, self.version, self.namespaced_resource)
    }

    /// `group/version/resource` of the cluster policy resource.
    pub fn cluster_id(&self) -> String {
        format!("{}/{}/{}", self.group, self.version, self.cluster_resource)
    }
}

fn default_group() -> String {
    "momiji.com".into()
}
fn default_version() -> String {
    "v1".into()
}
fn default_namespaced_resource() -> String {
    "jsadmissions".into()
}
fn default_cluster_resource() -> String {
    "clusterjsadmissions".into()
}
fn default_mutate_annotation() -> String {
    "jsadmissions.momiji.com/mutate".into()
}
