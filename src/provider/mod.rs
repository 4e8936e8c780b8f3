//! Third-party OAuth login.
//!
//! Each provider exchanges an authorization code and reports who signed in as
//! a [`NormalizedUser`].

mod google;
mod linkedin;
mod orcid;

pub use self::google::Google;
pub use self::linkedin::LinkedIn;
pub use self::orcid::Orcid;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const ORCID: &str = "orcid";
pub const GOOGLE: &str = "google";
pub const LINKEDIN: &str = "linkedin";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("code exchange failed: {0}")]
    Exchange(#[source] reqwest::Error),
    #[error("cannot retrieve user profile: {0}")]
    Profile(#[source] reqwest::Error),
    #[error("provider rejected login: {0}")]
    Rejected(String),
}

/// External user as reported by a provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedUser {
    pub name: String,
    pub email: String,
    /// Provider-assigned id.
    pub id: String,
    pub provider: String,
}

impl NormalizedUser {
    /// Key under which the login is known: the provider id for ORCID, which
    /// does not share emails, otherwise the email address.
    pub fn identity(&self) -> &str {
        if self.provider == ORCID {
            &self.id
        } else {
            &self.email
        }
    }
}

/// Authorization code sent back by a provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderRequest {
    pub code: String,
    pub client_id: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

#[async_trait]
pub trait ProviderLogin: Send + Sync {
    async fn login(
        &self,
        request: &ProviderRequest,
        secret: &str,
    ) -> Result<NormalizedUser, ProviderError>;
}

/// OAuth client secret of each provider.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSecrets {
    pub google: String,
    pub linkedin: String,
    pub orcid: String,
}

impl std::fmt::Debug for ProviderSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderSecrets { .. }")
    }
}

impl ProviderSecrets {
    fn get(&self, provider: &str) -> &str {
        match provider {
            GOOGLE => &self.google,
            LINKEDIN => &self.linkedin,
            ORCID => &self.orcid,
            _ => "",
        }
    }
}

/// Provider logins by name.
#[derive(Clone, Default)]
pub struct Providers {
    logins: HashMap<&'static str, Arc<dyn ProviderLogin>>,
    secrets: ProviderSecrets,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("logins", &self.logins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Providers {
    /// Empty registry.
    pub fn new(secrets: ProviderSecrets) -> Self {
        Self {
            logins: HashMap::new(),
            secrets,
        }
    }

    /// Registry with Google, LinkedIn and ORCID sharing one HTTP client.
    pub fn with_defaults(secrets: ProviderSecrets) -> Self {
        let client = reqwest::Client::new();

        Self::new(secrets)
            .register(GOOGLE, Google::new(client.clone()))
            .register(LINKEDIN, LinkedIn::new(client.clone()))
            .register(ORCID, Orcid::new(client))
    }

    pub fn register(
        mut self,
        name: &'static str,
        login: impl ProviderLogin + 'static,
    ) -> Self {
        self.logins.insert(name, Arc::new(login));
        self
    }

    /// Log in through the provider called `name`.
    ///
    /// An unknown provider is not an error: it yields an empty user.
    pub async fn login(
        &self,
        name: &str,
        request: &ProviderRequest,
    ) -> Result<NormalizedUser, ProviderError> {
        match self.logins.get(name) {
            Some(login) => login.login(request, self.secrets.get(name)).await,
            None => {
                tracing::warn!(provider = %name, "unknown login provider");
                Ok(NormalizedUser::default())
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Post an authorization code to a token endpoint.
async fn exchange<T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    request: &ProviderRequest,
    secret: &str,
) -> Result<T, ProviderError> {
    let scope = request.scopes.join(" ");
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", request.code.as_str()),
        ("client_id", request.client_id.as_str()),
        ("client_secret", secret),
        ("redirect_uri", request.redirect_url.as_str()),
    ];
    if !scope.is_empty() {
        form.push(("scope", scope.as_str()));
    }

    client
        .post(endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&form)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ProviderError::Exchange)?
        .json::<T>()
        .await
        .map_err(ProviderError::Exchange)
}

/// Fetch a profile with a bearer token.
async fn profile<T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    token: &AccessToken,
) -> Result<T, ProviderError> {
    client
        .get(endpoint)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ProviderError::Profile)?
        .json::<T>()
        .await
        .map_err(ProviderError::Profile)
}
