use crate::error::AppResult;
use crate::json::Envelope;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Response};
use serde_json::json;

use super::respond;

// Liveness plus build info; never touches the store
pub async fn healthcheck(State(state): State<AppState>) -> AppResult<Response> {
    let system_info = json!({
        "environment": state.config.server.environment,
        "version": env!("CARGO_PKG_VERSION"),
    });
    let envelope = Envelope::new().with("status", "available")?.with("system_info", &system_info)?;
    respond(StatusCode::OK, envelope)
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> AppResult<Response> {
    let snapshot = state.metrics.get_snapshot();
    respond(StatusCode::OK, Envelope::new().with("metrics", &snapshot)?)
}
