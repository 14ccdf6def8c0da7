//! `admission.k8s.io/v1` AdmissionReview wire format.
//!
//! Only the fields the controller reads are modelled; the API server adds
//! more (userInfo, dryRun, options...) which are ignored on decode.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsAdmitError, Result};
use crate::protocol::kind::GroupVersionKind;

pub const REVIEW_API_VERSION: &str = "admission.k8s.io/v1";
pub const REVIEW_KIND: &str = "AdmissionReview";

/// Admission operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        }
    }
}

/// Review envelope (request in, response out).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

fn default_api_version() -> String {
    REVIEW_API_VERSION.into()
}
fn default_kind() -> String {
    REVIEW_KIND.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub operation: Operation,
    #[serde(default)]
    pub object: Option<Value>,
    #[serde(default)]
    pub old_object: Option<Value>,
}

impl AdmissionRequest {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Object handed to hooks: `oldObject` for DELETE, `object` otherwise.
    pub fn target_object(&self) -> Option<&Value> {
        match self.operation {
            Operation::Delete => self.old_object.as_ref(),
            _ => self.object.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Base64 encoded JSON patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
}

impl AdmissionResponse {
    pub fn from_decision(uid: impl Into<String>, decision: AdmissionDecision) -> Self {
        let status = decision.message.map(|message| Status { message });
        let (patch, patch_type) = match decision.patch {
            Some(bytes) => (Some(STANDARD.encode(bytes)), Some(PatchType::JsonPatch)),
            None => (None, None),
        };
        Self {
            uid: uid.into(),
            allowed: decision.allowed,
            status,
            patch,
            patch_type,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.message.as_str())
    }

    /// Decoded patch bytes, if any.
    pub fn patch_bytes(&self) -> Option<Vec<u8>> {
        self.patch.as_ref().and_then(|p| STANDARD.decode(p).ok())
    }
}

impl AdmissionReview {
    /// Decode a review body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let review: AdmissionReview = serde_json::from_slice(body)
            .map_err(|e| JsAdmitError::RequestDecode(e.to_string()))?;
        tracing::trace!(api_version = %review.api_version, "admission review decoded");
        Ok(review)
    }

    /// Take the request out of a decoded review.
    pub fn into_request(self) -> Result<AdmissionRequest> {
        self.request
            .ok_or_else(|| JsAdmitError::RequestDecode("review has no request".into()))
    }

    /// Build the response review for `uid`.
    pub fn respond(uid: impl Into<String>, decision: AdmissionDecision) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            request: None,
            response: Some(AdmissionResponse::from_decision(uid, decision)),
        }
    }

    /// Best-effort uid extraction from a body that failed strict decoding.
    pub fn uid_hint(body: &[u8]) -> String {
        serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("request")
                    .and_then(|r| r.get("uid"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default()
    }
}

/// Transport-independent admission outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub message: Option<String>,
    /// Raw JSON patch (RFC 6902) bytes.
    pub patch: Option<Vec<u8>>,
}

impl AdmissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
            patch: None,
        }
    }

    pub fn patched(patch: Vec<u8>) -> Self {
        Self {
            allowed: true,
            message: None,
            patch: Some(patch),
        }
    }
}
