//! Notifications sent after tokens are issued.

mod nats;

pub use self::nats::{NatsMessaging, Topics};

use async_trait::async_trait;

use crate::token::TokenPair;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("cannot encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cannot publish on {subject}: {message}")]
    Publish { subject: String, message: String },
}

/// Emit issued token pairs to interested services.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_tokens(
        &self,
        subject: &str,
        tokens: &TokenPair,
    ) -> Result<(), PublishError>;
}
