//! Claim sets carried by access and refresh tokens.

use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ISSUER: &str = "dictyBase";
pub const DEFAULT_SUBJECT: &str = "dictyBase login token";
pub const DEFAULT_AUDIENCE: &str = "user";
pub const ACCESS_TOKEN_LIFETIME: u64 = 60 * 15; // 15 minutes.
pub const REFRESH_TOKEN_LIFETIME: u64 = 60 * 60 * 24 * 30; // 30 days.
const JTI_LENGTH: usize = 20;

/// Registered claims present on every token.
///
/// An access token carries nothing else: it proves that a session exists, not
/// who owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Organization that issued the token.
    pub iss: String,
    pub sub: String,
    /// Role tag the token is intended for.
    pub aud: String,
    /// Issued at, seconds since epoch.
    pub iat: u64,
    /// Not before, seconds since epoch.
    pub nbf: u64,
    /// Expiration, seconds since epoch.
    pub exp: u64,
    /// Unique token id.
    pub jti: String,
}

/// Claims of a refresh token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Key used to look up the user: the provider id for ORCID, an email
    /// address for the others.
    pub identity: String,
    /// Login provider name.
    pub provider: String,
    #[serde(flatten)]
    pub registered: Claims,
}

/// Access to the registered part of a claim set.
pub trait Registered {
    fn registered(&self) -> &Claims;
}

impl Registered for Claims {
    fn registered(&self) -> &Claims {
        self
    }
}

impl Registered for RefreshClaims {
    fn registered(&self) -> &Claims {
        &self.registered
    }
}

/// Fixed fields and lifetimes stamped on newly built claims.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimsPolicy {
    pub issuer: String,
    pub subject: String,
    pub audience: String,
    /// Access token lifetime in seconds.
    pub access_lifetime: u64,
    /// Refresh token lifetime in seconds.
    pub refresh_lifetime: u64,
}

impl Default for ClaimsPolicy {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_owned(),
            subject: DEFAULT_SUBJECT.to_owned(),
            audience: DEFAULT_AUDIENCE.to_owned(),
            access_lifetime: ACCESS_TOKEN_LIFETIME,
            refresh_lifetime: REFRESH_TOKEN_LIFETIME,
        }
    }
}

impl ClaimsPolicy {
    /// Build access claims issued at `now`.
    pub fn access(&self, now: u64) -> Claims {
        self.registered(now, self.access_lifetime)
    }

    /// Build refresh claims issued at `now` for `identity` on `provider`.
    pub fn refresh(
        &self,
        identity: impl Into<String>,
        provider: impl Into<String>,
        now: u64,
    ) -> RefreshClaims {
        RefreshClaims {
            identity: identity.into(),
            provider: provider.into(),
            registered: self.registered(now, self.refresh_lifetime),
        }
    }

    fn registered(&self, now: u64, lifetime: u64) -> Claims {
        Claims {
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: now + lifetime,
            jti: new_jti(),
        }
    }
}

/// Random, URL-safe token id.
pub fn new_jti() -> String {
    Alphanumeric.sample_string(&mut OsRng, JTI_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims() {
        let policy = ClaimsPolicy::default();
        let claims = policy.access(1_000);

        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.sub, DEFAULT_SUBJECT);
        assert_eq!(claims.aud, DEFAULT_AUDIENCE);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.nbf, 1_000);
        assert_eq!(claims.exp, 1_000 + ACCESS_TOKEN_LIFETIME);
        assert_eq!(claims.jti.len(), JTI_LENGTH);
    }

    #[test]
    fn test_refresh_claims() {
        let policy = ClaimsPolicy::default();
        let claims = policy.refresh("art@example.com", "google", 1_000);

        assert_eq!(claims.identity, "art@example.com");
        assert_eq!(claims.provider, "google");
        assert_eq!(claims.registered.exp, 1_000 + REFRESH_TOKEN_LIFETIME);

        // custom fields sit next to registered ones.
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["identity"], "art@example.com");
        assert_eq!(json["iss"], DEFAULT_ISSUER);
        assert!(json.get("registered").is_none());
    }

    #[test]
    fn test_jti_is_unique() {
        let policy = ClaimsPolicy::default();
        assert_ne!(policy.access(0).jti, policy.access(0).jti);
    }
}
