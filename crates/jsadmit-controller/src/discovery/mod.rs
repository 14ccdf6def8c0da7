//! Resolution of declared resource names to watchable kinds.
//!
//! - `catalog`: in-memory list of served resources and the matching rules.
//! - `kube_discovery`: `Discovery` over the API server discovery endpoints.

pub mod catalog;
pub mod kube_discovery;

use async_trait::async_trait;

use jsadmit_core::error::Result;
use jsadmit_core::protocol::ResourceKind;

pub use catalog::{Catalog, CatalogEntry};
pub use kube_discovery::KubeDiscovery;

/// Discovery collaborator.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Resolve `resource`, `version/resource` or `group/version/resource`.
    async fn resolve_resource(&self, declared: &str) -> Result<ResourceKind>;

    /// Canonical kind id of a declared resource.
    async fn resolve_kind(&self, declared: &str) -> Result<String> {
        Ok(self.resolve_resource(declared).await?.kind_id())
    }
}
