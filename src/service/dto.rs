//! Request and response bodies of the credential operations.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::lookup::{Identity, User};
use crate::token::TokenPair;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewLogin {
    #[validate(length(min = 1, message = "Provider is required."))]
    pub provider: String,
    #[validate(length(min = 1, message = "Authorization code is required."))]
    pub code: String,
    #[validate(length(min = 1, message = "Client id is required."))]
    pub client_id: String,
    #[validate(url(message = "Redirect URL must be an absolute URL."))]
    pub redirect_url: String,
    /// Space separated scopes.
    #[serde(default)]
    pub scopes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewRelogin {
    #[validate(length(min = 1, message = "Refresh token is required."))]
    pub refresh_token: String,
}

/// Silent refresh request. The access token is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewToken {
    #[serde(default)]
    pub access_token: String,
    #[validate(length(min = 1, message = "Refresh token is required."))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewRefreshToken {
    #[validate(length(min = 1, message = "Refresh token is required."))]
    pub refresh_token: String,
}

/// Issued tokens with the records of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResult {
    pub token: String,
    pub refresh_token: String,
    pub user: User,
    pub identity: Identity,
}

impl AuthResult {
    pub fn new(tokens: TokenPair, user: User, identity: Identity) -> Self {
        Self {
            token: tokens.token,
            refresh_token: tokens.refresh_token,
            user,
            identity,
        }
    }

    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            token: self.token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}
