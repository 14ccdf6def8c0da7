//! Protocol modules (identifiers + admission wire format).
//!
//! - `kind`: canonical kind/resource identifiers and shorthand parsing.
//! - `review`: `admission.k8s.io/v1` AdmissionReview request/response and
//!   the transport-independent `AdmissionDecision`.
//!
//! Decoders are panic-free: malformed input is reported as `JsAdmitError`.

pub mod kind;
pub mod review;

pub use kind::{GroupVersionKind, ResourceKind, ResourceQuery};
pub use review::{
    AdmissionDecision, AdmissionRequest, AdmissionResponse, AdmissionReview, Operation, PatchType,
};
