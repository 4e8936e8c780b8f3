//! NATS messaging.
//!
//! Token pairs are published as JSON. Identity and user records are fetched
//! with request/reply on their own subjects.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{PublishError, Publisher};
use crate::lookup::{Identity, IdentityLookup, LookupError, User, UserLookup};
use crate::token::TokenPair;

pub const DEFAULT_IDENTITY_SUBJECT: &str =
    "IdentityService.GetIdentityByProvider";
pub const DEFAULT_USER_SUBJECT: &str = "UserService.Get";
pub const DEFAULT_TOKEN_ISSUED_SUBJECT: &str = "AuthService.Create";

/// Subjects used to talk with other services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub identity: String,
    pub user: String,
    pub token_issued: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY_SUBJECT.to_owned(),
            user: DEFAULT_USER_SUBJECT.to_owned(),
            token_issued: DEFAULT_TOKEN_ISSUED_SUBJECT.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
struct IdentityRequest<'a> {
    provider: &'a str,
    identifier: &'a str,
}

#[derive(Debug, Serialize)]
struct IdRequest {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Reply<T> {
    #[serde(default)]
    exist: bool,
    status: Option<Status>,
    #[serde(alias = "identity", alias = "user")]
    record: Option<T>,
}

impl<T> Reply<T> {
    /// Turn a reply into the record it carries.
    ///
    /// A status with `exist` unset means the record is missing, any other
    /// status is a failure of the remote service.
    fn into_result(self, what: &str) -> Result<T, LookupError> {
        match (self.status, self.record) {
            (Some(status), _) if !self.exist => Err(LookupError::NotFound(
                format!("{what} ({})", status.message),
            )),
            (Some(status), _) => Err(LookupError::Upstream(format!(
                "code {}: {}",
                status.code, status.message
            ))),
            (None, Some(record)) => Ok(record),
            (None, None) if !self.exist => {
                Err(LookupError::NotFound(what.to_owned()))
            },
            (None, None) => {
                Err(LookupError::Upstream(format!("empty reply for {what}")))
            },
        }
    }
}

/// Messaging over a NATS connection.
#[derive(Debug, Clone)]
pub struct NatsMessaging {
    client: async_nats::Client,
    timeout: Duration,
    topics: Topics,
}

impl NatsMessaging {
    pub async fn connect(
        url: &str,
        timeout: Duration,
        topics: Topics,
    ) -> Result<Self, async_nats::ConnectError> {
        tracing::info!(%url, "connecting to nats");
        let client = async_nats::connect(url).await?;

        Ok(Self {
            client,
            timeout,
            topics,
        })
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    async fn request<Req, Res>(
        &self,
        subject: &str,
        request: &Req,
        what: &str,
    ) -> Result<Res, LookupError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|err| LookupError::Upstream(err.to_string()))?;

        let message = tokio::time::timeout(
            self.timeout,
            self.client.request(subject.to_owned(), payload.into()),
        )
        .await
        .map_err(|_| LookupError::Timeout)?
        .map_err(|err| LookupError::Upstream(err.to_string()))?;

        serde_json::from_slice::<Reply<Res>>(&message.payload)
            .map_err(|err| LookupError::Upstream(err.to_string()))?
            .into_result(what)
    }
}

#[async_trait]
impl Publisher for NatsMessaging {
    async fn publish_tokens(
        &self,
        subject: &str,
        tokens: &TokenPair,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(tokens)?;

        self.client
            .publish(subject.to_owned(), payload.into())
            .await
            .map_err(|err| PublishError::Publish {
                subject: subject.to_owned(),
                message: err.to_string(),
            })
    }
}

#[async_trait]
impl IdentityLookup for NatsMessaging {
    async fn get_identity(
        &self,
        provider: &str,
        identifier: &str,
    ) -> Result<Identity, LookupError> {
        self.request(
            &self.topics.identity,
            &IdentityRequest {
                provider,
                identifier,
            },
            &format!("identity {identifier} on {provider}"),
        )
        .await
    }
}

#[async_trait]
impl UserLookup for NatsMessaging {
    async fn get_user(&self, id: i64) -> Result<User, LookupError> {
        self.request(&self.topics.user, &IdRequest { id }, &format!("user {id}"))
            .await
    }
}
