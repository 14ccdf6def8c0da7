//! Axum router wiring.
//!
//! Webhook endpoints (`/mutate`, `/validate`) plus liveness, readiness and
//! metrics.

use axum::routing::{get, post};
use axum::Router;

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/mutate", post(transport::webhook::mutate))
        .route("/validate", post(transport::webhook::validate))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
