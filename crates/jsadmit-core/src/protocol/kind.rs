//! Canonical resource identifiers.
//!
//! Kinds are keyed everywhere (cache, locks, registry, admission matching) by
//! the canonical kind id: `group/version/Kind`, or `version/Kind` for the core
//! group.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Group/version/kind triple as carried by admission requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Canonical kind id (`v1/Pod`, `apps/v1/Deployment`).
    pub fn kind_id(&self) -> String {
        join_id(&self.group, &self.version, &self.kind)
    }
}

/// A fully resolved, watchable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name used in API paths (`deployments`).
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceKind {
    /// `apiVersion` as written in objects (`v1`, `apps/v1`).
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Canonical kind id.
    pub fn kind_id(&self) -> String {
        join_id(&self.group, &self.version, &self.kind)
    }

    /// Canonical resource id (`v1/pods`, `apps/v1/deployments`).
    pub fn resource_id(&self) -> String {
        join_id(&self.group, &self.version, &self.plural)
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::new(&self.group, &self.version, &self.kind)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_id())
    }
}

fn join_id(group: &str, version: &str, last: &str) -> String {
    if group.is_empty() {
        format!("{version}/{last}")
    } else {
        format!("{group}/{version}/{last}")
    }
}

/// Partially specified resource, as declared by policy authors.
///
/// Empty `group`/`version` are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl ResourceQuery {
    /// Parse `resource`, `version/resource` or `group/version/resource`.
    ///
    /// A single slash always means `version/resource` (core group style).
    pub fn parse(declared: &str) -> Self {
        let declared = declared.trim();
        let mut parts = declared.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(v), Some(r)) => Self {
                group: g.to_string(),
                version: v.to_string(),
                resource: r.to_string(),
            },
            (Some(v), Some(r), None) => Self {
                group: String::new(),
                version: v.to_string(),
                resource: r.to_string(),
            },
            _ => Self {
                group: String::new(),
                version: String::new(),
                resource: declared.to_string(),
            },
        }
    }

    /// True when `candidate` satisfies every non-empty field.
    pub fn matches(&self, candidate: &ResourceKind) -> bool {
        let resource = self.resource.to_ascii_lowercase();
        let named = candidate.plural.eq_ignore_ascii_case(&resource)
            || candidate.kind.eq_ignore_ascii_case(&resource);
        named
            && (self.group.is_empty() || self.group == candidate.group)
            && (self.version.is_empty() || self.version == candidate.version)
    }
}

impl fmt::Display for ResourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.group.is_empty(), self.version.is_empty()) {
            (true, true) => f.write_str(&self.resource),
            (true, false) => write!(f, "{}/{}", self.version, self.resource),
            _ => write!(f, "{}/{}/{}", self.group, self.version, self.resource),
        }
    }
}
