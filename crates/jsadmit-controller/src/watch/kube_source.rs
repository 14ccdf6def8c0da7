use futures_util::{future, StreamExt};
use futures_util::stream::BoxStream;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use serde_json::Value;

use jsadmit_core::error::{JsAdmitError, Result};
use jsadmit_core::protocol::ResourceKind;
use jsadmit_core::ObjectExt;

use super::source::{ResourceSource, SourceEvent};

/// Watches kinds cluster-wide through the API server.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ResourceSource for KubeSource {
    fn subscribe(&self, kind: &ResourceKind) -> BoxStream<'static, Result<SourceEvent>> {
        let gvk = GroupVersionKind::gvk(&kind.group, &kind.version, &kind.kind);
        let ar = ApiResource::from_gvk_with_plural(&gvk, &kind.plural);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);

        let resource = kind.resource_id();
        let api_version = kind.api_version();
        let kind_name = kind.kind.clone();
        let mut listing: Option<Vec<Value>> = None;

        watcher(api, watcher::Config::default())
            .default_backoff()
            .filter_map(move |event| {
                let out = match event {
                    Ok(watcher::Event::Init) => {
                        listing = Some(Vec::new());
                        None
                    }
                    Ok(watcher::Event::InitApply(obj)) => {
                        match to_value(obj, &api_version, &kind_name) {
                            Ok(v) => {
                                listing.get_or_insert_with(Vec::new).push(v);
                                None
                            }
                            Err(e) => Some(Err(e)),
                        }
                    }
                    Ok(watcher::Event::InitDone) => {
                        Some(Ok(SourceEvent::Restarted(listing.take().unwrap_or_default())))
                    }
                    Ok(watcher::Event::Apply(obj)) => {
                        Some(to_value(obj, &api_version, &kind_name).map(SourceEvent::Applied))
                    }
                    Ok(watcher::Event::Delete(obj)) => {
                        Some(to_value(obj, &api_version, &kind_name).map(SourceEvent::Deleted))
                    }
                    Err(e) => Some(Err(JsAdmitError::WatchSync {
                        resource: resource.clone(),
                        reason: e.to_string(),
                    })),
                };
                future::ready(out)
            })
            .boxed()
    }
}

/// Watch events do not always carry type metadata; fill it in.
fn to_value(obj: DynamicObject, api_version: &str, kind: &str) -> Result<Value> {
    let mut v = serde_json::to_value(obj)
        .map_err(|e| JsAdmitError::Internal(format!("object encode failed: {e}")))?;
    if v.nested_str(&["apiVersion"]).is_none() {
        v.set_nested(&["apiVersion"], Value::String(api_version.to_string()));
    }
    if v.nested_str(&["kind"]).is_none() {
        v.set_nested(&["kind"], Value::String(kind.to_string()));
    }
    Ok(v)
}
