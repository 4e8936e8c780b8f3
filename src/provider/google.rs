use async_trait::async_trait;
use serde::Deserialize;

use super::{
    AccessToken, GOOGLE, NormalizedUser, ProviderError, ProviderLogin,
    ProviderRequest, exchange, profile,
};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PROFILE_URL: &str = "https://www.googleapis.com/userinfo/v2/me";

#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

impl From<GoogleUser> for NormalizedUser {
    fn from(user: GoogleUser) -> Self {
        NormalizedUser {
            name: user.name,
            email: user.email,
            id: user.id,
            provider: GOOGLE.to_owned(),
        }
    }
}

/// Google sign-in.
#[derive(Debug, Clone)]
pub struct Google {
    client: reqwest::Client,
}

impl Google {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderLogin for Google {
    async fn login(
        &self,
        request: &ProviderRequest,
        secret: &str,
    ) -> Result<NormalizedUser, ProviderError> {
        let token: AccessToken =
            exchange(&self.client, TOKEN_URL, request, secret).await?;
        let user: GoogleUser = profile(&self.client, PROFILE_URL, &token).await?;

        Ok(user.into())
    }
}
