//! Collaborator interfaces for account persistence.
//!
//! The request pipeline only talks to storage through [`UserStore`] and
//! [`TokenStore`]. Every call is wrapped in [`bounded`] so a slow backend turns
//! into a server fault instead of holding the request open.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::identity::User;
use crate::auth::token::{Scope, Token, TokenDigest};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("edit conflict")]
    EditConflict,
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks up the owner of an unexpired token with the given scope.
    async fn find_by_token_digest(&self, digest: &TokenDigest, scope: Scope) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Persists a new user, filling in `id`, `created_at` and `version`.
    async fn insert(&self, user: &mut User) -> Result<(), StoreError>;

    /// Writes `user` back if the stored version still equals `user.version`,
    /// then stores the bumped version in `user.version`.
    async fn update(&self, user: &mut User) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError>;

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError>;
}

/// Runs a store call under `timeout`.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, StoreError>(())
        };
        let result = bounded(Duration::from_secs(3), slow).await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let result = bounded(Duration::from_secs(3), async { Err::<(), _>(StoreError::NotFound) }).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
