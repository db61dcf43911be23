//! Credentials, bearer tokens and request identity.
//!
//! - [`password`]: bcrypt hashing and verification of user passwords
//! - [`token`]: random bearer tokens and their SHA-256 lookup digests
//! - [`identity`]: the `Anonymous` / `Authenticated` principal of a request
//! - [`resolver`]: maps an `Authorization` header to an identity

pub mod identity;
pub mod password;
pub mod resolver;
pub mod token;

pub use identity::{Identity, User};
pub use password::{CredentialHash, CredentialHasher};
pub use resolver::{AuthError, Authenticator};
pub use token::{Scope, Token, TokenDigest};
