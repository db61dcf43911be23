use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{StoreError, TokenStore, UserStore};
use crate::auth::identity::User;
use crate::auth::token::{Scope, Token, TokenDigest};

#[derive(Debug, Clone)]
struct TokenRecord {
    digest: TokenDigest,
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: Scope,
}

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    tokens: Vec<TokenRecord>,
    next_id: i64,
}

/// Process-local user and token store.
///
/// Mirrors the constraints a relational backend would enforce: unique emails,
/// optimistic versioning on update, and scope/expiry filtering on token lookup.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_token_digest(&self, digest: &TokenDigest, scope: Scope) -> Result<User, StoreError> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        let record = tables
            .tokens
            .iter()
            .find(|t| t.digest == *digest && t.scope == scope && t.expiry > now)
            .ok_or(StoreError::NotFound)?;
        tables.users.get(&record.user_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let tables = self.tables.read().await;
        tables.users.values().find(|u| u.email == email).cloned().ok_or(StoreError::NotFound)
    }

    async fn insert(&self, user: &mut User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        tables.next_id += 1;
        user.id = tables.next_id;
        user.created_at = Utc::now();
        user.version = 1;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(StoreError::DuplicateEmail);
        }
        let stored = tables.users.get_mut(&user.id).ok_or(StoreError::EditConflict)?;
        if stored.version != user.version {
            return Err(StoreError::EditConflict);
        }
        user.version += 1;
        *stored = user.clone();
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.tokens.push(TokenRecord {
            digest: token.digest,
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope,
        });
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.tokens.retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::CredentialHash;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new("reader".to_string(), email.to_string(), CredentialHash::from_bytes(b"h".to_vec()))
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let mut a = user("a@example.com");
        store.insert(&mut a).await.unwrap();
        assert_eq!(a.id, 1);

        let mut dup = user("a@example.com");
        assert!(matches!(store.insert(&mut dup).await, Err(StoreError::DuplicateEmail)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_requires_current_version() {
        let store = MemoryStore::new();
        let mut u = user("v@example.com");
        store.insert(&mut u).await.unwrap();

        let mut stale = u.clone();
        u.activated = true;
        store.update(&mut u).await.unwrap();
        assert_eq!(u.version, 2);

        stale.username = "other".to_string();
        assert!(matches!(store.update(&mut stale).await, Err(StoreError::EditConflict)));

        let stored = store.find_by_email("v@example.com").await.unwrap();
        assert!(stored.activated);
        assert_eq!(stored.username, "reader");
    }

    #[tokio::test]
    async fn test_token_lookup_enforces_scope_and_expiry() {
        let store = MemoryStore::new();
        let mut u = user("t@example.com");
        store.insert(&mut u).await.unwrap();

        let live = Token::authentication(u.id);
        let expired = Token::generate(u.id, Duration::seconds(-1), Scope::Authentication);
        store.insert_token(&live).await.unwrap();
        store.insert_token(&expired).await.unwrap();

        let found = store.find_by_token_digest(&live.digest, Scope::Authentication).await.unwrap();
        assert_eq!(found.id, u.id);

        assert!(matches!(
            store.find_by_token_digest(&live.digest, Scope::Activation).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.find_by_token_digest(&expired.digest, Scope::Authentication).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_all_for_user_only_touches_scope() {
        let store = MemoryStore::new();
        let mut u = user("d@example.com");
        store.insert(&mut u).await.unwrap();
        let act = Token::activation(u.id);
        let auth = Token::authentication(u.id);
        store.insert_token(&act).await.unwrap();
        store.insert_token(&auth).await.unwrap();

        store.delete_all_for_user(Scope::Activation, u.id).await.unwrap();
        assert!(store.find_by_token_digest(&act.digest, Scope::Activation).await.is_err());
        assert!(store.find_by_token_digest(&auth.digest, Scope::Authentication).await.is_ok());
    }
}
