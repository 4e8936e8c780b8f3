//! Active refresh token records.
//!
//! One record per identity, holding the refresh token currently allowed to
//! rotate. Backends only need atomic single-key operations.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no active refresh token matches")]
    NotFound,
    #[error("token store unavailable: {0}")]
    Backend(#[source] BoxError),
}

/// Storage of the active refresh token of every identity.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Whether `identity` has an active refresh token.
    ///
    /// Existence only: the stored value is not compared with any presented
    /// token.
    async fn has_token(&self, identity: &str) -> Result<bool, StoreError>;

    /// Active refresh token of `identity`, if any.
    async fn get_token(
        &self,
        identity: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Make `token` the active refresh token of `identity`, replacing any
    /// previous one. A zero `ttl` never expires.
    async fn set_token(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Remove the record whose active token is `token`.
    ///
    /// Returns [`StoreError::NotFound`] when no identity currently holds it.
    async fn delete_token(&self, token: &str) -> Result<(), StoreError>;
}

/// Hex encoded SHA-256 of a token, used to index records by value.
pub(crate) fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
