//! Dynamic resource watching.
//!
//! - `source`: the subscription capability (`ResourceSource`) and its events.
//! - `kube_source`: `ResourceSource` over the API server watch protocol.
//! - `watcher`: `ResourceWatcher`, one subscription per kind feeding the
//!   cache and a pluggable event handler, plus kind-level locks.

pub mod kube_source;
pub mod source;
pub mod watcher;

use std::sync::Arc;

use async_trait::async_trait;
use jsadmit_core::protocol::ResourceKind;
use serde_json::Value;

pub use kube_source::KubeSource;
pub use source::{ResourceSource, SourceEvent};
pub use watcher::ResourceWatcher;

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::Deleted => "deleted",
        }
    }
}

/// Receives every change the watcher applied to the cache.
///
/// Called while the kind lock is held, after the cache was updated.
#[async_trait]
pub trait ResourceEventHandler: Send + Sync {
    async fn on_event(
        &self,
        kind: &ResourceKind,
        change: ChangeType,
        obj: Arc<Value>,
        old: Option<Arc<Value>>,
    );
}
