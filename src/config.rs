//! Configuration manager for passage.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::message::Topics;
use crate::provider::ProviderSecrets;
use crate::token::claims::{
    ACCESS_TOKEN_LIFETIME, DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_SUBJECT,
    REFRESH_TOKEN_LIFETIME,
};
use crate::token::{ClaimsPolicy, DEFAULT_ALGORITHM, TokenError, TokenManager};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:9560";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot parse {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing {0} key")]
    MissingKey(&'static str),
    #[error("{0} key is neither PEM nor base64 encoded PEM")]
    Encoding(&'static str),
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listen address.
    pub address: String,
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Token,
    /// Related to refresh token storage.
    pub store: Store,
    /// Related to NATS messaging.
    pub nats: Nats,
    /// OAuth client secrets.
    #[serde(skip_serializing)]
    pub providers: ProviderSecrets,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_owned(),
            address: DEFAULT_ADDRESS.to_owned(),
            version: VERSION.to_owned(),
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
            token: Token::default(),
            store: Store::default(),
            nats: Nats::default(),
            providers: ProviderSecrets::default(),
        }
    }
}

/// Json Web Token configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub algorithm: Algorithm,
    /// PEM, or base64 encoded PEM.
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    pub issuer: String,
    pub subject: String,
    pub audience: String,
    /// Seconds.
    pub access_lifetime: u64,
    /// Seconds.
    pub refresh_lifetime: u64,
    /// Clock skew tolerance, in seconds.
    pub leeway: u64,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_ALGORITHM,
            private_key_pem: None,
            public_key_pem: None,
            private_key_path: None,
            public_key_path: None,
            issuer: DEFAULT_ISSUER.to_owned(),
            subject: DEFAULT_SUBJECT.to_owned(),
            audience: DEFAULT_AUDIENCE.to_owned(),
            access_lifetime: ACCESS_TOKEN_LIFETIME,
            refresh_lifetime: REFRESH_TOKEN_LIFETIME,
            leeway: 0,
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("algorithm", &self.algorithm)
            .field("private_key_path", &self.private_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .finish_non_exhaustive()
    }
}

impl Token {
    pub fn policy(&self) -> ClaimsPolicy {
        ClaimsPolicy {
            issuer: self.issuer.clone(),
            subject: self.subject.clone(),
            audience: self.audience.clone(),
            access_lifetime: self.access_lifetime,
            refresh_lifetime: self.refresh_lifetime,
        }
    }

    /// Load keys and build the token engine.
    pub fn manager(&self) -> Result<TokenManager, ConfigError> {
        let private_key = load_pem(
            "private",
            self.private_key_pem.as_deref(),
            self.private_key_path.as_deref(),
        )?;
        let public_key = load_pem(
            "public",
            self.public_key_pem.as_deref(),
            self.public_key_path.as_deref(),
        )?;

        Ok(TokenManager::new(self.algorithm, &private_key, &public_key)?
            .issuer(&self.issuer)
            .audience(&self.audience)
            .leeway(self.leeway))
    }
}

/// Accept inline PEM, base64 encoded PEM, or a path to a PEM file.
fn load_pem(
    what: &'static str,
    inline: Option<&str>,
    path: Option<&Path>,
) -> Result<Vec<u8>, ConfigError> {
    match (inline, path) {
        (Some(pem), _) if pem.trim_start().starts_with("-----BEGIN") => {
            Ok(pem.as_bytes().to_vec())
        },
        (Some(encoded), _) => STANDARD
            .decode(encoded.trim())
            .map_err(|_| ConfigError::Encoding(what)),
        (None, Some(path)) => {
            std::fs::read(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        },
        (None, None) => Err(ConfigError::MissingKey(what)),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Redis,
}

/// Refresh token storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub backend: Backend,
    /// Redis connection URL.
    pub url: String,
    /// Key prefix.
    pub prefix: String,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            url: DEFAULT_REDIS_URL.to_owned(),
            prefix: "passage:".to_owned(),
        }
    }
}

/// NATS configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nats {
    pub url: String,
    /// Seconds to wait for a lookup reply.
    pub timeout: u64,
    pub topics: Topics,
}

impl Default for Nats {
    fn default() -> Self {
        Self {
            url: DEFAULT_NATS_URL.to_owned(),
            timeout: 5,
            topics: Topics::default(),
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing file falls back to the defaults, an unparsable one is an
    /// error.
    pub fn read(self) -> Result<Self, ConfigError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        };

        let mut config = match File::open(&file_path) {
            Ok(file) => serde_yaml::from_reader::<_, Configuration>(file)
                .map_err(|source| ConfigError::Yaml {
                    path: file_path.clone(),
                    source,
                })?,
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();
        config.path = file_path;

        Ok(config)
    }

    /// Override secrets and endpoints from the environment.
    pub fn with_env<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("JWT_PRIVATE_KEY") {
            self.token.private_key_pem = Some(key);
        }
        if let Some(key) = var("JWT_PUBLIC_KEY") {
            self.token.public_key_pem = Some(key);
        }
        if let Some(url) = var("REDIS_URL") {
            self.store.url = url;
        }
        if let Some(url) = var("NATS_URL") {
            self.nats.url = url;
        }
        self
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, path = ?self.path, "`config.yaml` file not found");
        Self::default()
    }
}
