//! HTTP routing and the middleware pipeline around it.
//!
//! - `health`: healthcheck and metrics
//! - `users`: registration, activation, current user
//! - `tokens`: login (authentication token issue)

pub mod health;
pub mod tokens;
pub mod users;

use axum::{
    http::{HeaderMap, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{AppError, AppResult};
use crate::json::{write_json, Envelope};
use crate::middleware::{auth, rate_limit, recover};
use crate::state::AppState;

/// Builds the full application: routes, gates, and the fixed middleware order
/// recovery → rate limit → authenticate.
pub fn router(state: AppState) -> Router {
    let activated = Router::new()
        .route("/api/v1/users/me", get(users::me))
        .route_layer(from_fn(auth::require_activated));

    let app = Router::new()
        .route("/api/v1/healthcheck", get(health::healthcheck))
        .route("/api/v1/users", post(users::register))
        .route("/api/v1/users/activated", put(users::activate))
        .route("/api/v1/tokens/authentication", post(tokens::create_authentication_token))
        .route("/metrics", get(health::metrics))
        .merge(activated)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        .layer(from_fn_with_state(state.clone(), rate_limit::rate_limit))
        .layer(TraceLayer::new_for_http());

    // CORS: permissive in debug builds for a separately served UI
    let app = if cfg!(debug_assertions) { app.layer(CorsLayer::permissive()) } else { app };

    app.layer(recover::layer(state.metrics.clone())).with_state(state)
}

pub(crate) fn respond(status: StatusCode, envelope: Envelope) -> AppResult<Response> {
    Ok(write_json(status, &envelope, HeaderMap::new())?)
}

async fn not_found() -> AppError {
    AppError::NotFound("the requested resource could not be found".to_string())
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}
