//! Password hashing with bcrypt.
//!
//! Plaintext passwords only ever exist inside [`CredentialHasher::hash`]; the
//! caller's buffer is zeroized once the hash has been computed.

use std::fmt;

use zeroize::Zeroize;

/// The work factor used for every stored password.
pub const DEFAULT_COST: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("stored credential hash is malformed: {0}")]
    Malformed(String),
    #[error("failed to hash credential: {0}")]
    HashFailed(String),
}

/// Opaque bcrypt hash as persisted by the user store.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CredentialHash(Vec<u8>);

impl CredentialHash {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Keep hashes out of logs even at debug level.
impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialHash(<redacted>)")
    }
}

/// One-way, salted hasher for user passwords.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl CredentialHasher {
    /// Builds a hasher with a custom work factor. Only tests should go below
    /// [`DEFAULT_COST`].
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    /// Hashes `plaintext` and wipes it.
    pub fn hash(&self, mut plaintext: String) -> Result<CredentialHash, HashError> {
        let result = bcrypt::hash(plaintext.as_bytes(), self.cost);
        plaintext.zeroize();
        result
            .map(|h| CredentialHash(h.into_bytes()))
            .map_err(|e| HashError::HashFailed(e.to_string()))
    }

    /// Checks `plaintext` against `hash`.
    ///
    /// A mismatch is `Ok(false)`; only an unreadable hash is an error.
    pub fn verify(&self, hash: &CredentialHash, plaintext: &str) -> Result<bool, HashError> {
        let stored = std::str::from_utf8(hash.as_bytes())
            .map_err(|_| HashError::Malformed("hash is not valid UTF-8".to_string()))?;
        bcrypt::verify(plaintext, stored).map_err(|e| HashError::Malformed(e.to_string()))
    }
}
