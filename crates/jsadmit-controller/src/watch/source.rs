use futures_util::stream::BoxStream;
use jsadmit_core::error::Result;
use jsadmit_core::protocol::ResourceKind;
use serde_json::Value;

/// One item of a kind subscription.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Object created or modified.
    Applied(Value),
    /// Object deleted (last known state).
    Deleted(Value),
    /// Complete listing of the kind (initial list or relist).
    Restarted(Vec<Value>),
}

/// Generic subscription capability over schema-less objects.
///
/// Streams are expected to retry transient failures themselves; errors are
/// reported for logging and do not end the subscription.
pub trait ResourceSource: Send + Sync {
    fn subscribe(&self, kind: &ResourceKind) -> BoxStream<'static, Result<SourceEvent>>;
}
