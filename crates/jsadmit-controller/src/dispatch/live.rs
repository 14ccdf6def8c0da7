use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use jsadmit_core::protocol::ResourceKind;
use jsadmit_core::ObjectExt;

use crate::registry::AdmissionRegistry;
use crate::watch::{ChangeType, ResourceEventHandler};

/// Calls `created`/`updated`/`deleted` on the units `find` returns.
///
/// Units are looked up on every event. Hook failures are logged and never
/// stop the event pipeline.
pub struct LiveDispatcher {
    registry: Arc<AdmissionRegistry>,
}

impl LiveDispatcher {
    pub fn new(registry: Arc<AdmissionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ResourceEventHandler for LiveDispatcher {
    async fn on_event(
        &self,
        kind: &ResourceKind,
        change: ChangeType,
        obj: Arc<Value>,
        old: Option<Arc<Value>>,
    ) {
        let units = self.registry.find(&kind.kind_id(), obj.namespace());
        if units.is_empty() {
            return;
        }

        let resource = kind.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            for unit in units {
                let res = match (change, old.as_deref()) {
                    (ChangeType::Updated, Some(prev)) => unit.updated(&obj, prev),
                    (ChangeType::Deleted, _) => unit.deleted(&obj),
                    _ => unit.created(&obj),
                };
                if let Err(e) = res {
                    tracing::error!(
                        policy = %unit.full_name(),
                        %resource,
                        namespace = obj.namespace(),
                        name = obj.name(),
                        change = change.as_str(),
                        code = e.code().as_str(),
                        error = %e,
                        "lifecycle hook failed"
                    );
                }
            }
        })
        .await;

        if let Err(e) = joined {
            tracing::error!(resource = %kind, error = %e, "lifecycle dispatch task failed");
        }
    }
}
