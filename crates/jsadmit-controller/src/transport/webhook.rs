use axum::body::Bytes;
use axum::extract::State;
use axum::Json;

use jsadmit_core::protocol::{AdmissionDecision, AdmissionRequest, AdmissionReview, Operation};
use jsadmit_core::ObjectExt;

use crate::admission;
use crate::app_state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Mutate,
    Validate,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Mutate => "mutate",
            Mode::Validate => "validate",
        }
    }
}

pub async fn mutate(State(state): State<AppState>, body: Bytes) -> Json<AdmissionReview> {
    Json(admit(&state, &body, Mode::Mutate).await)
}

pub async fn validate(State(state): State<AppState>, body: Bytes) -> Json<AdmissionReview> {
    Json(admit(&state, &body, Mode::Validate).await)
}

async fn admit(state: &AppState, body: &[u8], mode: Mode) -> AdmissionReview {
    let (review, outcome) = decide(state, body, mode).await;
    state
        .metrics()
        .admission_decisions
        .inc(&[("mode", mode.as_str()), ("outcome", outcome)]);
    review
}

async fn decide(state: &AppState, body: &[u8], mode: Mode) -> (AdmissionReview, &'static str) {
    let req = match AdmissionReview::from_slice(body).and_then(AdmissionReview::into_request) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(mode = mode.as_str(), code = e.code().as_str(), error = %e, "allowing undecodable review");
            let review =
                AdmissionReview::respond(AdmissionReview::uid_hint(body), AdmissionDecision::allow());
            return (review, "fail_open");
        }
    };

    let kind_id = req.kind.kind_id();
    let units = state.registry().find(&kind_id, req.namespace());
    if units.is_empty() {
        return (AdmissionReview::respond(req.uid, AdmissionDecision::allow()), "allowed");
    }

    let Some(obj) = req.target_object().filter(|o| o.is_object()).cloned() else {
        tracing::warn!(mode = mode.as_str(), kind = %kind_id, namespace = req.namespace(), name = req.name(), "allowing review without object");
        return (AdmissionReview::respond(req.uid, AdmissionDecision::allow()), "fail_open");
    };

    let shown = display_name(&req, &obj);
    tracing::trace!(mode = mode.as_str(), op = req.operation.as_str(), kind = %kind_id, namespace = req.namespace(), name = %shown, "admission review");

    let op = req.operation;
    let annotation = state.cfg().policies.mutate_annotation.clone();
    let decision = tokio::task::spawn_blocking(move || match mode {
        Mode::Mutate => admission::mutate(&units, op, &obj, &annotation),
        Mode::Validate => admission::validate(&units, op, &obj),
    })
    .await
    .unwrap_or_else(|e| AdmissionDecision::deny(format!("admission task failed: {e}")));

    let outcome = if !decision.allowed {
        tracing::info!(
            mode = mode.as_str(),
            op = op.as_str(),
            kind = %kind_id,
            namespace = req.namespace(),
            name = %shown,
            message = decision.message.as_deref().unwrap_or(""),
            "denied"
        );
        "denied"
    } else if decision.patch.is_some() {
        tracing::info!(mode = mode.as_str(), op = op.as_str(), kind = %kind_id, namespace = req.namespace(), name = %shown, "patched");
        "patched"
    } else {
        "allowed"
    };

    (AdmissionReview::respond(req.uid, decision), outcome)
}

/// Objects created with `generateName` have no name yet.
fn display_name(req: &AdmissionRequest, obj: &serde_json::Value) -> String {
    if req.operation == Operation::Create && req.name().is_empty() {
        format!("{}???", obj.generate_name())
    } else {
        req.name().to_string()
    }
}
