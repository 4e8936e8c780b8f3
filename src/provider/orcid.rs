use async_trait::async_trait;
use serde::Deserialize;

use super::{
    NormalizedUser, ORCID, ProviderError, ProviderLogin, ProviderRequest,
    exchange,
};

const TOKEN_URL: &str = "https://orcid.org/oauth/token";

/// Token response. ORCID puts the researcher in it, no profile call needed.
#[derive(Debug, Deserialize)]
struct OrcidUser {
    #[serde(default)]
    name: String,
    orcid: String,
}

impl From<OrcidUser> for NormalizedUser {
    fn from(user: OrcidUser) -> Self {
        NormalizedUser {
            name: user.name,
            email: String::new(),
            id: user.orcid,
            provider: ORCID.to_owned(),
        }
    }
}

/// ORCID sign-in.
#[derive(Debug, Clone)]
pub struct Orcid {
    client: reqwest::Client,
}

impl Orcid {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderLogin for Orcid {
    async fn login(
        &self,
        request: &ProviderRequest,
        secret: &str,
    ) -> Result<NormalizedUser, ProviderError> {
        let user: OrcidUser =
            exchange(&self.client, TOKEN_URL, request, secret).await?;

        Ok(user.into())
    }
}
