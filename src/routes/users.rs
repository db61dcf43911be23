use axum::{extract::State, http::StatusCode, response::Response};
use serde::Deserialize;
use serde_json::json;

use super::respond;
use crate::auth::{token, Identity, Scope, Token, TokenDigest, User};
use crate::error::{AppError, AppResult};
use crate::json::{Envelope, JsonBody};
use crate::state::AppState;
use crate::store::{bounded, StoreError};
use crate::validator::{validate_email, validate_password_plaintext, validate_username, Validator};

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateInput {
    pub token: String,
}

/// POST /api/v1/users
///
/// Creates an inactive account and mails an activation token. The mail goes
/// out in the background; the 201 does not wait for it.
pub async fn register(State(state): State<AppState>, JsonBody(input): JsonBody<RegisterInput>) -> AppResult<Response> {
    let mut v = Validator::new();
    validate_username(&mut v, &input.username);
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.is_empty() {
        return Err(AppError::FailedValidation(v.into_errors()));
    }

    let RegisterInput { username, email, password } = input;
    let hasher = state.hasher;
    let hash = tokio::task::spawn_blocking(move || hasher.hash(password)).await??;

    let timeout = state.config.store_timeout();
    let mut user = User::new(username, email, hash);
    bounded(timeout, state.users.insert(&mut user)).await?;

    let token = Token::activation(user.id);
    bounded(timeout, state.tokens.insert_token(&token)).await?;

    let notifier = state.notifier.clone();
    let recipient = user.email.clone();
    let data = json!({
        "activation_token": token.plaintext,
        "user_id": user.id,
    });
    state.background.spawn("user_welcome", async move {
        notifier.send(&recipient, "user_welcome", &data).await
    });

    respond(StatusCode::CREATED, Envelope::new().with("user", &user)?)
}

/// PUT /api/v1/users/activated
pub async fn activate(State(state): State<AppState>, JsonBody(input): JsonBody<ActivateInput>) -> AppResult<Response> {
    let mut v = Validator::new();
    token::validate_plaintext(&mut v, &input.token);
    if !v.is_empty() {
        return Err(AppError::FailedValidation(v.into_errors()));
    }

    let timeout = state.config.store_timeout();
    let digest = TokenDigest::of(&input.token);
    let mut user = match bounded(timeout, state.users.find_by_token_digest(&digest, Scope::Activation)).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            v.add_error("token", "invalid or expired activation token");
            return Err(AppError::FailedValidation(v.into_errors()));
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    bounded(timeout, state.users.update(&mut user)).await?;
    bounded(timeout, state.tokens.delete_all_for_user(Scope::Activation, user.id)).await?;

    respond(StatusCode::OK, Envelope::new().with("user", &user)?)
}

/// GET /api/v1/users/me, behind the activated-user gate.
pub async fn me(identity: Identity) -> AppResult<Response> {
    let user = identity.user().ok_or(AppError::AuthenticationRequired)?;
    respond(StatusCode::OK, Envelope::new().with("user", user)?)
}
