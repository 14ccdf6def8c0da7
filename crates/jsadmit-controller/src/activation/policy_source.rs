use serde::Deserialize;
use serde_json::Value;

use jsadmit_core::error::{JsAdmitError, Result};

/// Policy as declared by a `jsadmissions` or `clusterjsadmissions` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefinition {
    /// Empty for cluster policies.
    pub namespace: String,
    pub name: String,
    /// Declared resource names, unresolved.
    pub kinds: Vec<String>,
    pub js: String,
}

#[derive(Deserialize)]
struct RawPolicy {
    metadata: RawMeta,
    #[serde(default)]
    spec: RawSpec,
}

#[derive(Deserialize)]
struct RawMeta {
    #[serde(default)]
    namespace: Option<String>,
    name: String,
}

#[derive(Deserialize, Default)]
struct RawSpec {
    #[serde(default)]
    kinds: Vec<String>,
    #[serde(default)]
    js: String,
}

impl PolicyDefinition {
    pub fn from_object(obj: &Value) -> Result<Self> {
        let raw = RawPolicy::deserialize(obj)
            .map_err(|e| JsAdmitError::RequestDecode(format!("invalid policy object: {e}")))?;
        Ok(Self {
            namespace: raw.metadata.namespace.unwrap_or_default(),
            name: raw.metadata.name,
            kinds: raw.spec.kinds,
            js: raw.spec.js,
        })
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }
}
