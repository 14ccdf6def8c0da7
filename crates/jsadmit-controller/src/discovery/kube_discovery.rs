use async_trait::async_trait;
use kube::discovery::{Discovery as ApiDiscovery, Scope};
use kube::Client;
use tokio::sync::RwLock;

use jsadmit_core::error::{JsAdmitError, Result};
use jsadmit_core::protocol::{ResourceKind, ResourceQuery};

use super::catalog::{Catalog, CatalogEntry};
use super::Discovery;

/// Discovery over the API server, with the catalog cached until a lookup
/// misses.
pub struct KubeDiscovery {
    client: Client,
    catalog: RwLock<Catalog>,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: RwLock::new(Catalog::default()),
        }
    }

    async fn refresh(&self) -> Result<()> {
        let discovery = ApiDiscovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| JsAdmitError::Internal(format!("api discovery failed: {e}")))?;

        let mut entries = Vec::new();
        for group in discovery.groups() {
            let preferred = group.preferred_version_or_latest().to_string();
            for version in group.versions() {
                for (ar, caps) in group.versioned_resources(version) {
                    entries.push(CatalogEntry {
                        kind: ResourceKind {
                            group: ar.group,
                            version: ar.version,
                            kind: ar.kind,
                            plural: ar.plural,
                            namespaced: caps.scope == Scope::Namespaced,
                        },
                        preferred: version == preferred,
                    });
                }
            }
        }

        tracing::debug!(resources = entries.len(), "discovery catalog refreshed");
        *self.catalog.write().await = Catalog::new(entries);
        Ok(())
    }
}

#[async_trait]
impl Discovery for KubeDiscovery {
    async fn resolve_resource(&self, declared: &str) -> Result<ResourceKind> {
        let query = ResourceQuery::parse(declared);
        if let Some(kind) = self.catalog.read().await.resolve(&query) {
            return Ok(kind);
        }

        self.refresh().await.map_err(|e| JsAdmitError::ResourceResolution {
            resource: declared.to_string(),
            reason: e.to_string(),
        })?;

        self.catalog
            .read()
            .await
            .resolve(&query)
            .ok_or_else(|| JsAdmitError::ResourceResolution {
                resource: declared.to_string(),
                reason: "no such resource served by the cluster".into(),
            })
    }
}
