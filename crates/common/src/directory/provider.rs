use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::types::{Identity, Locator};

const PROVIDERS_KEY_PREFIX: &[u8] = b"hoard/providers\0";

/// Key under which an identity's entries live in the directory service.
///
/// Always the lowercase hex SHA-256 of the identity string, so any node
///  derives the same key for the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectoryKey(String);

impl DirectoryKey {
    /// Length of a hex encoded key
    pub const HEX_LEN: usize = 64;

    pub fn for_identity(identity: &Identity) -> Self {
        let digest = Sha256::digest(identity.as_str().as_bytes());
        Self(hex::encode(digest))
    }

    /// Key of the provider records for one locator. The prefix keeps it
    ///  apart from any identity key.
    pub fn for_providers(locator: &Locator) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(PROVIDERS_KEY_PREFIX);
        hasher.update(locator.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept an already hashed key, e.g. one received over the wire.
    ///  Returns `None` unless it is exactly 64 lowercase hex characters.
    pub fn from_hex(hex_key: &str) -> Option<Self> {
        let valid = hex_key.len() == Self::HEX_LEN
            && hex_key
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(hex_key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DirectoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError<T> {
    /// The service could not be reached or timed out.
    ///  Callers may retry these.
    #[error("directory network error: {0}")]
    Network(String),
    /// Anything else the provider reports
    #[error("unhandled directory provider error: {0}")]
    Provider(T),
}

impl<T> DirectoryError<T> {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DirectoryError::Network(_))
    }
}

/// A distributed key/value directory: `put` appends a value under a key,
///  `get` returns every value stored under it.
#[async_trait]
pub trait DirectoryService: Send + Sync + Debug + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    /// Store `value` under `key`. Existing values are kept.
    async fn put(&self, key: &DirectoryKey, value: String)
        -> Result<(), DirectoryError<Self::Error>>;

    /// Every value stored under `key`, empty when there are none
    async fn get(&self, key: &DirectoryKey) -> Result<Vec<String>, DirectoryError<Self::Error>>;
}
