//! Token pair minting.

use crate::token::{
    ClaimsPolicy, RefreshClaims, TokenError, TokenManager, TokenPair,
};

/// Who a request acts for, taken from a provider login or from verified
/// refresh claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    pub identity: String,
    pub provider: String,
}

impl From<RefreshClaims> for Session {
    fn from(claims: RefreshClaims) -> Self {
        Self {
            identity: claims.identity,
            provider: claims.provider,
        }
    }
}

/// Sign a fresh access and refresh token for `session`.
pub(crate) fn mint(
    token: &TokenManager,
    policy: &ClaimsPolicy,
    session: &Session,
    now: u64,
) -> Result<TokenPair, TokenError> {
    let access = policy.access(now);
    let refresh = policy.refresh(&session.identity, &session.provider, now);

    Ok(TokenPair {
        token: token.encode(&access)?,
        refresh_token: token.encode(&refresh)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Claims;
    use crate::token::tests::manager;
    use jsonwebtoken::get_current_timestamp;

    #[test]
    fn test_mint() {
        let token = manager();
        let session = Session {
            identity: "art@example.com".into(),
            provider: "google".into(),
        };
        let pair = mint(
            &token,
            &ClaimsPolicy::default(),
            &session,
            get_current_timestamp(),
        )
        .unwrap();

        assert_ne!(pair.token, pair.refresh_token);
        assert!(token.verify::<Claims>(&pair.token).is_ok());

        let claims: RefreshClaims = token.verify(&pair.refresh_token).unwrap();
        assert_eq!(Session::from(claims), session);
    }
}
