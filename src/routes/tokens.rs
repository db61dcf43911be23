use axum::{extract::State, http::StatusCode, response::Response};
use serde::Deserialize;
use zeroize::Zeroize;

use super::respond;
use crate::auth::Token;
use crate::error::{AppError, AppResult};
use crate::json::{Envelope, JsonBody};
use crate::state::AppState;
use crate::store::{bounded, StoreError};
use crate::validator::{validate_email, validate_password_plaintext, Validator};

#[derive(Deserialize)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/tokens/authentication
///
/// Unknown email and wrong password get the same 401.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> AppResult<Response> {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.is_empty() {
        return Err(AppError::FailedValidation(v.into_errors()));
    }

    let timeout = state.config.store_timeout();
    let user = match bounded(timeout, state.users.find_by_email(&input.email)).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            state.metrics.inc_auth_failures();
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    let hasher = state.hasher;
    let hash = user.password.clone();
    let mut password = input.password;
    let matches = tokio::task::spawn_blocking(move || {
        let result = hasher.verify(&hash, &password);
        password.zeroize();
        result
    })
    .await??;
    if !matches {
        state.metrics.inc_auth_failures();
        return Err(AppError::InvalidCredentials);
    }

    let token = Token::authentication(user.id);
    bounded(timeout, state.tokens.insert_token(&token)).await?;

    respond(StatusCode::CREATED, Envelope::new().with("authentication_token", &token)?)
}
