//! RSA signing key generation.

use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

pub const DEFAULT_BITS: usize = 2048;
const MIN_BITS: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key size must be at least 2048 bits, got {0}")]
    TooSmall(usize),
    #[error("cannot generate key: {0}")]
    Generate(#[from] rsa::Error),
    #[error("cannot encode private key: {0}")]
    Private(#[from] rsa::pkcs1::Error),
    #[error("cannot encode public key: {0}")]
    Public(#[from] rsa::pkcs8::spki::Error),
    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// PEM encoded key pair.
pub struct KeyPair {
    /// PKCS#1 private key.
    pub private_pem: String,
    /// SubjectPublicKeyInfo public key.
    pub public_pem: String,
}

/// Generate an RSA key pair of `bits` bits.
pub fn generate(bits: usize) -> Result<KeyPair, KeyError> {
    if bits < MIN_BITS {
        return Err(KeyError::TooSmall(bits));
    }

    let private_key = RsaPrivateKey::new(&mut OsRng, bits)?;
    let public_key = RsaPublicKey::from(&private_key);

    Ok(KeyPair {
        private_pem: private_key.to_pkcs1_pem(LineEnding::LF)?.to_string(),
        public_pem: public_key.to_public_key_pem(LineEnding::LF)?,
    })
}

/// Generate a key pair and write both halves.
pub fn write(private: &Path, public: &Path, bits: usize) -> Result<(), KeyError> {
    let pair = generate(bits)?;

    for (path, pem) in [(private, &pair.private_pem), (public, &pair.public_pem)] {
        std::fs::write(path, pem).map_err(|source| KeyError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    tracing::info!(private = ?private, public = ?public, bits, "key pair written");
    Ok(())
}
