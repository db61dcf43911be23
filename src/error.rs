use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::auth::password::HashError;
use crate::auth::resolver::AuthError;
use crate::json::{write_json, DecodeError, Envelope};
use crate::store::StoreError;

/// The primary error type for the application.
///
/// Every fault that reaches the HTTP boundary is mapped to exactly one of these
/// variants; handlers and middleware never write error bodies themselves.
#[derive(Debug)]
pub enum AppError {
    /// Server-side fault. Logged in full, reported to the client generically.
    Internal(anyhow::Error),
    /// Client input that could not be used (bad parameter, bad query value).
    BadRequest(String),
    /// A request body that failed strict JSON decoding.
    Decode(DecodeError),
    /// For when a requested resource or route is not found.
    NotFound(String),
    /// The route exists but not for this method.
    MethodNotAllowed(String),
    /// Optimistic-concurrency conflict on update.
    EditConflict,
    /// Insert collided with an existing account's email address.
    DuplicateEmail,
    /// Malformed, unknown or expired bearer token.
    InvalidAuthenticationToken,
    /// Wrong email/password pair on login.
    InvalidCredentials,
    /// The route needs an authenticated caller and got an anonymous one.
    AuthenticationRequired,
    /// The caller is authenticated but has not activated the account.
    InactiveAccount,
    /// The client exhausted its token bucket.
    RateLimited,
    /// Per-field validation messages.
    FailedValidation(BTreeMap<String, String>),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Decode(e) => write!(f, "Bad request: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::MethodNotAllowed(method) => write!(f, "Method not allowed: {}", method),
            AppError::EditConflict => write!(f, "Conflict: edit conflict"),
            AppError::DuplicateEmail => write!(f, "Conflict: duplicate email"),
            AppError::InvalidAuthenticationToken => write!(f, "Unauthorized: invalid or missing authentication token"),
            AppError::InvalidCredentials => write!(f, "Unauthorized: invalid authentication credentials"),
            AppError::AuthenticationRequired => write!(f, "Unauthorized: authentication required"),
            AppError::InactiveAccount => write!(f, "Forbidden: account not activated"),
            AppError::RateLimited => write!(f, "Rate limit exceeded"),
            AppError::FailedValidation(errors) => write!(f, "Validation failed for {} field(s)", errors.len()),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            AppError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Decode(e) => e.status(),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::EditConflict | AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidAuthenticationToken
            | AppError::InvalidCredentials
            | AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::InactiveAccount => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();
        let (error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    "INTERNAL_ERROR",
                    "the server encountered a problem and could not process your request".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::Decode(e) => (e.code(), e.to_string(), None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg, None),
            AppError::MethodNotAllowed(method) => (
                "METHOD_NOT_ALLOWED",
                format!("the {} method is not supported for this resource", method),
                None,
            ),
            AppError::EditConflict => (
                "EDIT_CONFLICT",
                "unable to update the record due to an edit conflict, please try again".to_string(),
                None,
            ),
            AppError::DuplicateEmail => (
                "DUPLICATE_EMAIL",
                "a user with this email address already exists".to_string(),
                Some(json!({ "fields": { "email": "a user with this email address already exists" } })),
            ),
            AppError::InvalidAuthenticationToken => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                ("INVALID_TOKEN", "invalid or missing authentication token".to_string(), None)
            }
            AppError::InvalidCredentials => {
                ("INVALID_CREDENTIALS", "invalid authentication credentials".to_string(), None)
            }
            AppError::AuthenticationRequired => (
                "AUTHENTICATION_REQUIRED",
                "you must be authenticated to access this resource".to_string(),
                None,
            ),
            AppError::InactiveAccount => (
                "INACTIVE_ACCOUNT",
                "your user account must be activated to access this resource".to_string(),
                None,
            ),
            AppError::RateLimited => ("RATE_LIMITED", "rate limit exceeded".to_string(), None),
            AppError::FailedValidation(errors) => (
                "VALIDATION_ERROR",
                "the request failed validation".to_string(),
                Some(json!({ "fields": errors })),
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": error_message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        let mut envelope = Envelope::new();
        envelope.insert("error", error);
        envelope.insert("status", json!(status.as_u16()));
        envelope.insert("timestamp", json!(chrono::Utc::now().to_rfc3339()));

        match write_json(status, &envelope, headers) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to encode error response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("encoding response"))
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("the requested resource could not be found".to_string()),
            StoreError::EditConflict => AppError::EditConflict,
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredential => AppError::InvalidAuthenticationToken,
            AuthError::Store(e) => AppError::Internal(anyhow::Error::new(e).context("resolving bearer token")),
        }
    }
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("blocking task failed"))
    }
}

/// Best-effort text of a panic payload (`&str` or `String`, as produced by `panic!`).
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
