use async_trait::async_trait;
use serde::Deserialize;

use super::{
    AccessToken, LINKEDIN, NormalizedUser, ProviderError, ProviderLogin,
    ProviderRequest, exchange, profile,
};

const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const PROFILE_URL: &str = "https://api.linkedin.com/v2/userinfo";

/// OpenID profile.
#[derive(Debug, Deserialize)]
struct LinkedInUser {
    sub: String,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    email: String,
}

impl From<LinkedInUser> for NormalizedUser {
    fn from(user: LinkedInUser) -> Self {
        NormalizedUser {
            name: format!("{} {}", user.given_name, user.family_name)
                .trim()
                .to_owned(),
            email: user.email,
            id: user.sub,
            provider: LINKEDIN.to_owned(),
        }
    }
}

/// LinkedIn sign-in.
#[derive(Debug, Clone)]
pub struct LinkedIn {
    client: reqwest::Client,
}

impl LinkedIn {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderLogin for LinkedIn {
    async fn login(
        &self,
        request: &ProviderRequest,
        secret: &str,
    ) -> Result<NormalizedUser, ProviderError> {
        let token: AccessToken =
            exchange(&self.client, TOKEN_URL, request, secret).await?;
        let user: LinkedInUser =
            profile(&self.client, PROFILE_URL, &token).await?;

        Ok(user.into())
    }
}
