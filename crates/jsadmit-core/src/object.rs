//! Helpers over generic cluster objects.
//!
//! Watched kinds are declared at runtime, so objects stay schema-less
//! `serde_json::Value` trees. Accessors never panic on unexpected shapes.

use serde_json::{Map, Value};

/// Read/write access to well-known fields of a generic object.
pub trait ObjectExt {
    /// Walk `path` through nested maps.
    fn nested(&self, path: &[&str]) -> Option<&Value>;

    /// Nested string field, if present and a string.
    fn nested_str(&self, path: &[&str]) -> Option<&str> {
        self.nested(path).and_then(Value::as_str)
    }

    /// Set a nested field, creating intermediate maps.
    /// Returns false when a non-map value sits on the path.
    fn set_nested(&mut self, path: &[&str], value: Value) -> bool;

    /// `metadata.namespace`, empty for cluster-scoped objects.
    fn namespace(&self) -> &str {
        self.nested_str(&["metadata", "namespace"]).unwrap_or("")
    }

    /// `metadata.name`.
    fn name(&self) -> &str {
        self.nested_str(&["metadata", "name"]).unwrap_or("")
    }

    /// `metadata.generateName`.
    fn generate_name(&self) -> &str {
        self.nested_str(&["metadata", "generateName"]).unwrap_or("")
    }

    /// `metadata.resourceVersion`.
    fn resource_version(&self) -> Option<&str> {
        self.nested_str(&["metadata", "resourceVersion"])
    }
}

impl ObjectExt for Value {
    fn nested(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |cur, key| cur.as_object()?.get(*key))
    }

    fn set_nested(&mut self, path: &[&str], value: Value) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let mut cur = self;
        for key in parents {
            let Some(map) = cur.as_object_mut() else {
                return false;
            };
            cur = map
                .entry((*key).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if cur.is_null() {
                *cur = Value::Object(Map::new());
            }
        }
        match cur.as_object_mut() {
            Some(map) => {
                map.insert((*last).to_string(), value);
                true
            }
            None => false,
        }
    }
}

/// True when both objects carry the same resource version.
///
/// Objects without a resource version never compare equal, so they always
/// count as a change.
pub fn same_resource_version(old: &Value, new: &Value) -> bool {
    match (old.resource_version(), new.resource_version()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
