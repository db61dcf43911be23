use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthError, Identity, User};
use crate::error::AppError;
use crate::state::AppState;

/// Resolves the bearer token (if any) and stores the [`Identity`] in the
/// request extensions for everything further in.
///
/// Anonymous callers pass through; only a presented-but-bad token is rejected.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let identity = match state.authenticator.resolve(req.headers()).await {
        Ok(identity) => identity,
        Err(AuthError::InvalidCredential) => {
            state.metrics.inc_auth_failures();
            return Err(AppError::InvalidAuthenticationToken);
        }
        Err(e) => return Err(e.into()),
    };
    req.extensions_mut().insert(identity);

    let mut response = next.run(req).await;
    // Responses differ per caller; keep shared caches from mixing them up.
    response.headers_mut().append(header::VARY, HeaderValue::from_static("Authorization"));
    Ok(response)
}

/// Gate: the caller must not be anonymous.
pub fn check_authenticated(identity: &Identity) -> Result<&User, AppError> {
    identity.user().ok_or(AppError::AuthenticationRequired)
}

/// Gate: the caller must be authenticated and activated.
pub fn check_activated(identity: &Identity) -> Result<&User, AppError> {
    let user = check_authenticated(identity)?;
    if !user.activated {
        return Err(AppError::InactiveAccount);
    }
    Ok(user)
}

fn gate(req: &Request, check: fn(&Identity) -> Result<&User, AppError>) -> Result<(), AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("authorization gate reached without a resolved identity")))?;
    check(identity).map(|_| ())
}

pub async fn require_authenticated(req: Request, next: Next) -> Result<Response, AppError> {
    gate(&req, check_authenticated)?;
    Ok(next.run(req).await)
}

pub async fn require_activated(req: Request, next: Next) -> Result<Response, AppError> {
    gate(&req, check_activated)?;
    Ok(next.run(req).await)
}
