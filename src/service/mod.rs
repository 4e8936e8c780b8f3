//! Credential lifecycle: login, relogin, silent refresh and logout.
//!
//! Each identity has at most one active refresh token. Every issuance
//! overwrites it, logout deletes it. A refresh token is only honored while
//! its identity still has an active record.

pub mod dto;
mod issue;

pub use dto::{AuthResult, NewLogin, NewRefreshToken, NewRelogin, NewToken};

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::get_current_timestamp;
use metrics::counter;
use validator::Validate;

use self::issue::{Session, mint};
use crate::error::{Result, ServerError};
use crate::lookup::{Identity, IdentityLookup, User, UserLookup};
use crate::message::Publisher;
use crate::provider::{ProviderRequest, Providers};
use crate::store::TokenStore;
use crate::token::{Claims, ClaimsPolicy, RefreshClaims, TokenManager, TokenPair};

/// Everything an [`AuthService`] needs.
pub struct ServiceParams {
    pub token: TokenManager,
    pub policy: ClaimsPolicy,
    pub store: Arc<dyn TokenStore>,
    pub providers: Providers,
    pub identities: Arc<dyn IdentityLookup>,
    pub users: Arc<dyn UserLookup>,
    pub publisher: Arc<dyn Publisher>,
    /// Subject issued token pairs are published on.
    pub topic: String,
}

/// Credential lifecycle orchestrator.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<ServiceParams>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token", &self.inner.token)
            .field("providers", &self.inner.providers)
            .field("topic", &self.inner.topic)
            .finish()
    }
}

impl AuthService {
    pub fn new(params: ServiceParams) -> Self {
        Self {
            inner: Arc::new(params),
        }
    }

    pub fn token(&self) -> &TokenManager {
        &self.inner.token
    }

    /// Sign in through a provider.
    #[tracing::instrument(skip_all, fields(provider = %login.provider))]
    pub async fn login(&self, login: NewLogin) -> Result<AuthResult> {
        record("login", self.try_login(login).await)
    }

    /// Sign in again from a refresh token.
    #[tracing::instrument(skip_all)]
    pub async fn relogin(&self, relogin: NewRelogin) -> Result<AuthResult> {
        record("relogin", self.try_relogin(relogin).await)
    }

    /// Exchange a refresh token for a new pair, without lookups.
    #[tracing::instrument(skip_all)]
    pub async fn get_refresh_token(&self, request: NewToken) -> Result<TokenPair> {
        record("refresh", self.try_refresh(request).await)
    }

    /// Revoke a refresh token.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self, logout: NewRefreshToken) -> Result<()> {
        record("logout", self.try_logout(logout).await)
    }

    async fn try_login(&self, login: NewLogin) -> Result<AuthResult> {
        login.validate()?;

        let request = ProviderRequest {
            code: login.code,
            client_id: login.client_id,
            redirect_url: login.redirect_url,
            scopes: login.scopes.split_whitespace().map(str::to_owned).collect(),
        };
        let user = self.inner.providers.login(&login.provider, &request).await?;
        let session = Session {
            identity: user.identity().to_owned(),
            provider: login.provider,
        };

        let (identity, user) = self.resolve(&session).await?;
        let tokens = self.issue("login", &session).await?;
        self.notify(&tokens).await?;

        counter!("passage_logins_total", "provider" => session.provider.clone())
            .increment(1);
        tracing::info!(identity = %session.identity, "user logged in");

        Ok(AuthResult::new(tokens, user, identity))
    }

    async fn try_relogin(&self, relogin: NewRelogin) -> Result<AuthResult> {
        relogin.validate()?;

        let session = self.authenticate(&relogin.refresh_token).await?;
        let (identity, user) = self.resolve(&session).await?;
        let tokens = self.issue("relogin", &session).await?;
        self.notify(&tokens).await?;

        Ok(AuthResult::new(tokens, user, identity))
    }

    async fn try_refresh(&self, request: NewToken) -> Result<TokenPair> {
        request.validate()?;

        if !request.access_token.is_empty() {
            self.inner.token.verify::<Claims>(&request.access_token)?;
        }

        let session = self.authenticate(&request.refresh_token).await?;
        self.issue("refresh", &session).await
    }

    async fn try_logout(&self, logout: NewRefreshToken) -> Result<()> {
        logout.validate()?;

        self.inner.store.delete_token(&logout.refresh_token).await?;
        tracing::info!("refresh token revoked");

        Ok(())
    }

    /// Verify a refresh token and check its identity still has an active
    /// record.
    ///
    /// The record is not compared with `refresh_token`: any valid refresh
    /// token of an identity holding a record passes.
    async fn authenticate(&self, refresh_token: &str) -> Result<Session> {
        let claims: RefreshClaims = self.inner.token.verify(refresh_token)?;
        let session = Session::from(claims);

        if !self.inner.store.has_token(&session.identity).await? {
            return Err(ServerError::Revoked {
                identity: session.identity,
            });
        }

        Ok(session)
    }

    /// Fetch identity, then its user.
    async fn resolve(&self, session: &Session) -> Result<(Identity, User)> {
        let identity = self
            .inner
            .identities
            .get_identity(&session.provider, &session.identity)
            .await?;
        let user = self.inner.users.get_user(identity.user_id).await?;

        Ok((identity, user))
    }

    /// Mint a pair and make its refresh token the active one.
    async fn issue(
        &self,
        operation: &'static str,
        session: &Session,
    ) -> Result<TokenPair> {
        let policy = &self.inner.policy;
        let tokens = mint(
            &self.inner.token,
            policy,
            session,
            get_current_timestamp(),
        )?;

        self.inner
            .store
            .set_token(
                &session.identity,
                &tokens.refresh_token,
                Duration::from_secs(policy.refresh_lifetime),
            )
            .await?;

        counter!("passage_tokens_issued_total", "operation" => operation)
            .increment(1);

        Ok(tokens)
    }

    async fn notify(&self, tokens: &TokenPair) -> Result<()> {
        self.inner
            .publisher
            .publish_tokens(&self.inner.topic, tokens)
            .await?;
        Ok(())
    }
}

fn record<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        let kind = err.kind();
        counter!(
            "passage_errors_total",
            "operation" => operation,
            "kind" => kind.as_str()
        )
        .increment(1);
        tracing::debug!(%operation, %kind, error = %err, "request failed");
    }
    result
}
