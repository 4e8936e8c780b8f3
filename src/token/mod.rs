//! Sign and verify json web tokens.
//!
//! A [`TokenManager`] is pinned to one asymmetric algorithm. Verification
//! reports every failure as one of seven [`TokenError`] kinds so callers can
//! branch on what went wrong.

pub mod claims;

pub use claims::{Claims, ClaimsPolicy, RefreshClaims, Registered};

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode,
    decode_header, encode, get_current_timestamp,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS512;

/// Failures of the token engine.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no token found")]
    NoTokenFound,
    #[error("token is expired")]
    Expired,
    #[error("token iat validation failed")]
    IssuedAtInvalid,
    #[error("token nbf validation failed")]
    NotBeforeInvalid,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("algorithm mismatch")]
    AlgorithmMismatch,
    #[error("token is unauthorized")]
    Unauthorized,

    #[error("signing key rejected: {0}")]
    Key(#[source] JwtError),
    #[error("failed to sign token: {0}")]
    Signing(#[source] JwtError),
}

impl TokenError {
    /// Whether the error comes from verifying a token rather than from the
    /// engine itself.
    pub fn is_verification(&self) -> bool {
        match self {
            TokenError::NoTokenFound
            | TokenError::Expired
            | TokenError::IssuedAtInvalid
            | TokenError::NotBeforeInvalid
            | TokenError::InvalidSignature
            | TokenError::AlgorithmMismatch
            | TokenError::Unauthorized => true,
            TokenError::Key(_) | TokenError::Signing(_) => false,
        }
    }
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            JwtErrorKind::InvalidToken
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Utf8(_) => TokenError::NoTokenFound,
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            JwtErrorKind::ImmatureSignature => TokenError::NotBeforeInvalid,
            JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
            JwtErrorKind::InvalidAlgorithm
            | JwtErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            },
            _ => TokenError::Unauthorized,
        }
    }
}

/// Access and refresh token minted together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    private_key: EncodingKey,
    public_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("algorithm", &self.algorithm)
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenManager {
    /// Create a new [`TokenManager`] from PEM encoded keys.
    ///
    /// Only asymmetric algorithms are accepted.
    pub fn new(
        algorithm: Algorithm,
        private_key_pem: &[u8],
        public_key_pem: &[u8],
    ) -> Result<Self, TokenError> {
        let (private_key, public_key) = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (
                EncodingKey::from_rsa_pem(private_key_pem),
                DecodingKey::from_rsa_pem(public_key_pem),
            ),
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(private_key_pem),
                DecodingKey::from_ec_pem(public_key_pem),
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(private_key_pem),
                DecodingKey::from_ed_pem(public_key_pem),
            ),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(TokenError::Key(
                    JwtErrorKind::InvalidAlgorithm.into(),
                ));
            },
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);
        validation.set_issuer(&[claims::DEFAULT_ISSUER]);
        validation.set_audience(&[claims::DEFAULT_AUDIENCE]);

        Ok(Self {
            algorithm,
            private_key: private_key.map_err(TokenError::Key)?,
            public_key: public_key.map_err(TokenError::Key)?,
            validation,
        })
    }

    /// Expected `iss` claim.
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Expected `aud` claim.
    pub fn audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self
    }

    /// Clock skew tolerated on time based claims, in seconds.
    pub fn leeway(mut self, leeway: u64) -> Self {
        self.validation.leeway = leeway;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `claims` into a compact token.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let header = Header::new(self.algorithm);
        encode(&header, claims, &self.private_key).map_err(TokenError::Signing)
    }

    /// Parse and check a token.
    ///
    /// Never returns [`TokenError::Key`] nor [`TokenError::Signing`].
    pub fn verify<T>(&self, token: &str) -> Result<T, TokenError>
    where
        T: DeserializeOwned + Registered,
    {
        if token.is_empty() {
            return Err(TokenError::NoTokenFound);
        }
        if decode_header(token).is_err() {
            let declared = declared_algorithm(token)
                .map(|alg| alg.parse::<Algorithm>().ok());
            return Err(match declared {
                Some(alg) if alg != Some(self.algorithm) => {
                    TokenError::AlgorithmMismatch
                },
                _ => TokenError::NoTokenFound,
            });
        }

        let claims = decode::<T>(token, &self.public_key, &self.validation)?.claims;

        if claims.registered().iat > get_current_timestamp() + self.validation.leeway {
            return Err(TokenError::IssuedAtInvalid);
        }

        Ok(claims)
    }
}

/// `alg` of a three part token whose header is JSON, even when the
/// algorithm is unknown to the decoder (`none` for instance).
fn declared_algorithm(token: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct RawHeader {
        alg: String,
    }

    let mut parts = token.split('.');
    let header = parts.next()?;
    if parts.count() != 2 {
        return None;
    }

    let header = URL_SAFE_NO_PAD.decode(header).ok()?;
    serde_json::from_slice::<RawHeader>(&header)
        .ok()
        .map(|header| header.alg)
}
