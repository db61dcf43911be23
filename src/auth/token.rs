//! Bearer token generation and digesting.
//!
//! Tokens are 16 random bytes encoded as unpadded URL-safe Base64 (22
//! characters). Only the SHA-256 digest of a token is ever stored; the
//! plaintext is handed to the client once and then dropped.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::validator::Validator;

/// Random bytes per token.
const TOKEN_RANDOM_BYTES: usize = 16;

/// Length of the encoded plaintext handed to clients.
pub const TOKEN_PLAINTEXT_LEN: usize = 22;

/// Lifetime of a login token.
pub const AUTHENTICATION_TTL_HOURS: i64 = 24;

/// Lifetime of an account activation token.
pub const ACTIVATION_TTL_DAYS: i64 = 3;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-length SHA-256 digest used as the lookup key for stored tokens.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    /// Digests a plaintext token. Deterministic and unsalted.
    pub fn of(plaintext: &str) -> Self {
        Self(Sha256::digest(plaintext.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A short prefix is enough to correlate log lines.
        write!(f, "TokenDigest({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// A freshly issued token. `plaintext` is only populated at creation time.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub digest: TokenDigest,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("digest", &self.digest)
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Token {
    /// Issues a new random token for `user_id`, valid for `ttl`.
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Self {
        let mut random_bytes = [0u8; TOKEN_RANDOM_BYTES];
        OsRng.fill_bytes(&mut random_bytes);
        let plaintext = URL_SAFE_NO_PAD.encode(random_bytes);
        let digest = TokenDigest::of(&plaintext);

        Self { plaintext, digest, user_id, expiry: Utc::now() + ttl, scope }
    }

    pub fn authentication(user_id: i64) -> Self {
        Self::generate(user_id, Duration::hours(AUTHENTICATION_TTL_HOURS), Scope::Authentication)
    }

    pub fn activation(user_id: i64) -> Self {
        Self::generate(user_id, Duration::days(ACTIVATION_TTL_DAYS), Scope::Activation)
    }
}

/// Whether `plaintext` could have been produced by [`Token::generate`].
pub fn is_well_formed(plaintext: &str) -> bool {
    if plaintext.len() != TOKEN_PLAINTEXT_LEN {
        return false;
    }
    matches!(URL_SAFE_NO_PAD.decode(plaintext), Ok(bytes) if bytes.len() == TOKEN_RANDOM_BYTES)
}

pub fn validate_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        &format!("must be {} bytes long", TOKEN_PLAINTEXT_LEN),
    );
    v.check(is_well_formed(plaintext), "token", "must be a valid token");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = TokenDigest::of("Y3JlZGVudGlhbHMtdGVzdA");
        let b = TokenDigest::of("Y3JlZGVudGlhbHMtdGVzdA");
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), 32);
    }

    #[test]
    fn test_digest_differs_per_token() {
        let a = TokenDigest::of("AAAAAAAAAAAAAAAAAAAAAA");
        let b = TokenDigest::of("AAAAAAAAAAAAAAAAAAAAAQ");
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_tokens_are_well_formed_and_unique() {
        let a = Token::authentication(7);
        let b = Token::authentication(7);
        assert_eq!(a.plaintext.len(), TOKEN_PLAINTEXT_LEN);
        assert!(is_well_formed(&a.plaintext));
        assert_ne!(a.plaintext, b.plaintext);
        assert_eq!(a.digest, TokenDigest::of(&a.plaintext));
        assert_eq!(a.scope, Scope::Authentication);
        assert!(a.expiry > Utc::now());
    }

    #[test]
    fn test_activation_token_lives_longer() {
        let auth = Token::authentication(1);
        let act = Token::activation(1);
        assert!(act.expiry > auth.expiry);
        assert_eq!(act.scope.as_str(), "activation");
    }

    #[test]
    fn test_well_formed_rejects_garbage() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("badtoken"));
        assert!(!is_well_formed("!!!!!!!!!!!!!!!!!!!!!!"));
        assert!(!is_well_formed("AAAAAAAAAAAAAAAAAAAAAAAA"));
    }

    #[test]
    fn test_validate_plaintext_reports_token_field() {
        let mut v = Validator::new();
        validate_plaintext(&mut v, "short");
        assert!(!v.is_empty());
        assert!(v.errors().contains_key("token"));

        let mut v = Validator::new();
        validate_plaintext(&mut v, &Token::activation(1).plaintext);
        assert!(v.is_empty());
    }

    #[test]
    fn test_debug_redacts_plaintext() {
        let token = Token::authentication(3);
        let printed = format!("{:?}", token);
        assert!(!printed.contains(&token.plaintext));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("user_id: 3"));
    }

    #[test]
    fn test_serialized_token_hides_digest() {
        let token = Token::authentication(3);
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["token"], token.plaintext);
        assert!(value.get("expiry").is_some());
        assert!(value.get("digest").is_none());
        assert!(value.get("user_id").is_none());
    }
}
