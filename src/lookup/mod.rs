//! Identity and user records owned by other services.
//!
//! Records are opaque to this crate: only the keys needed to chain lookups
//! are typed, everything else is carried through untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The record does not exist.
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("lookup timed out")]
    Timeout,
    #[error("lookup failed: {0}")]
    Upstream(String),
}

/// Login identity of a user on one provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: i64,
    /// Email or provider id.
    pub identifier: String,
    pub provider: String,
    /// Internal id of the owning user.
    pub user_id: i64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Resolve the identity registered for an external login.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn get_identity(
        &self,
        provider: &str,
        identifier: &str,
    ) -> Result<Identity, LookupError>;
}

/// Resolve a user by internal id.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<User, LookupError>;
}
