use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};

use super::identity::Identity;
use super::token::{self, Scope, TokenDigest};
use crate::store::{self, StoreError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed, unknown or expired bearer token. Deliberately uniform.
    #[error("invalid or missing authentication token")]
    InvalidCredential,
    #[error("user store failure: {0}")]
    Store(#[source] StoreError),
}

/// Turns the `Authorization` header of a request into an [`Identity`].
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { users, timeout }
    }

    /// Resolves the caller.
    ///
    /// No header (or an empty one) is the anonymous identity, not an error:
    /// public routes stay open and protected ones opt into a gate.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(Identity::Anonymous);
        };
        let value = value.to_str().map_err(|_| AuthError::InvalidCredential)?;
        if value.is_empty() {
            return Ok(Identity::Anonymous);
        }

        let plaintext = parse_bearer(value).ok_or(AuthError::InvalidCredential)?;
        if !token::is_well_formed(plaintext) {
            return Err(AuthError::InvalidCredential);
        }

        let digest = TokenDigest::of(plaintext);
        let lookup = self.users.find_by_token_digest(&digest, Scope::Authentication);
        match store::bounded(self.timeout, lookup).await {
            Ok(user) => Ok(Identity::Authenticated(user)),
            Err(StoreError::NotFound) => Err(AuthError::InvalidCredential),
            Err(e) => Err(AuthError::Store(e)),
        }
    }
}

/// Splits `Bearer <token>`; anything but exactly two space-separated parts
/// with the `Bearer` scheme is rejected.
fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::User;
    use crate::auth::password::CredentialHash;
    use crate::auth::token::Token;
    use crate::store::{MemoryStore, TokenStore};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use chrono::Duration as ChronoDuration;

    async fn store_with_user() -> (Arc<MemoryStore>, User) {
        let store = Arc::new(MemoryStore::new());
        let mut user = User::new(
            "reader".to_string(),
            "reader@example.com".to_string(),
            CredentialHash::from_bytes(b"h".to_vec()),
        );
        store.insert(&mut user).await.unwrap();
        (store, user)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        headers
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
        assert_eq!(parse_bearer("bearer abc"), None);
    }

    #[tokio::test]
    async fn test_no_header_is_anonymous() {
        let (store, _) = store_with_user().await;
        let auth = Authenticator::new(store, Duration::from_secs(3));
        let identity = auth.resolve(&HeaderMap::new()).await.unwrap();
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn test_bad_format_is_invalid() {
        let (store, _) = store_with_user().await;
        let auth = Authenticator::new(store, Duration::from_secs(3));
        assert!(matches!(auth.resolve(&bearer("badtoken")).await, Err(AuthError::InvalidCredential)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(auth.resolve(&headers).await, Err(AuthError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_unknown_or_expired_token_is_invalid() {
        let (store, user) = store_with_user().await;
        let expired = Token::generate(user.id, ChronoDuration::seconds(-5), Scope::Authentication);
        store.insert_token(&expired).await.unwrap();
        let auth = Authenticator::new(store, Duration::from_secs(3));

        let unknown = Token::authentication(user.id);
        assert!(matches!(auth.resolve(&bearer(&unknown.plaintext)).await, Err(AuthError::InvalidCredential)));
        assert!(matches!(auth.resolve(&bearer(&expired.plaintext)).await, Err(AuthError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_wrong_scope_is_invalid() {
        let (store, user) = store_with_user().await;
        let activation = Token::activation(user.id);
        store.insert_token(&activation).await.unwrap();
        let auth = Authenticator::new(store, Duration::from_secs(3));
        assert!(matches!(
            auth.resolve(&bearer(&activation.plaintext)).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let (store, user) = store_with_user().await;
        let token = Token::authentication(user.id);
        store.insert_token(&token).await.unwrap();
        let auth = Authenticator::new(store, Duration::from_secs(3));

        match auth.resolve(&bearer(&token.plaintext)).await.unwrap() {
            Identity::Authenticated(found) => {
                assert_eq!(found.id, user.id);
                assert_eq!(found.email, "reader@example.com");
            }
            Identity::Anonymous => panic!("expected authenticated identity"),
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn find_by_token_digest(&self, _: &TokenDigest, _: Scope) -> Result<User, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
        async fn find_by_email(&self, _: &str) -> Result<User, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn insert(&self, _: &mut User) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update(&self, _: &mut User) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_not_a_credential_error() {
        let auth = Authenticator::new(Arc::new(BrokenStore), Duration::from_secs(3));
        let token = Token::authentication(1);
        assert!(matches!(auth.resolve(&bearer(&token.plaintext)).await, Err(AuthError::Store(_))));
    }
}
