use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::password::CredentialHash;
use crate::error::AppError;

/// A registered account as seen by the request pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: CredentialHash,
    pub activated: bool,
    /// Optimistic-concurrency counter, bumped by the store on every update.
    #[serde(skip)]
    pub version: i32,
}

impl User {
    /// A user that has not been persisted yet.
    pub fn new(username: String, email: String, password: CredentialHash) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            username,
            email,
            password,
            activated: false,
            version: 1,
        }
    }
}

/// The principal behind a request.
///
/// Written once by the authentication middleware into the request extensions
/// and read back by the authorization gates and handlers.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Missing means the authentication layer was not installed for this route.
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("missing identity in request extensions")))
    }
}
