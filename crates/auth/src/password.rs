//! Argon2id password hashing.
//!
//! Both entry points take the plaintext as a mutable buffer and wipe it before
//! returning, whatever the outcome.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroize;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHashConfig {
    /// Iterations.
    pub time_cost: u32,
    /// Memory in KiB.
    pub memory_cost_kib: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    /// 3 passes over 128 MiB on 2 lanes; well above 100ms on commodity hardware.
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_cost_kib: 128 * 1024,
            parallelism: 2,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(String),
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon: Argon2<'static>,
    config: PasswordHashConfig,
}

impl core::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("config", &self.config)
            .finish()
    }
}

impl PasswordHasher {
    pub fn new(config: PasswordHashConfig) -> Result<Self, PasswordHashError> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordHashError::Params(e.to_string()))?;

        Ok(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            config,
        })
    }

    pub fn config(&self) -> PasswordHashConfig {
        self.config
    }

    /// Hash `secret` with a fresh random salt.
    ///
    /// The result is a PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`)
    /// that carries everything [`verify`](Self::verify) needs.
    pub fn hash(&self, secret: &mut [u8]) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let result = self
            .argon
            .hash_password(secret, &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordHashError::Hash(e.to_string()));
        secret.zeroize();
        result
    }

    /// Check `secret` against a stored PHC string.
    ///
    /// The digest comparison is constant-time. An unparseable hash is a
    /// mismatch, not an error.
    pub fn verify(&self, secret: &mut [u8], hash: &str) -> bool {
        let matched = match PasswordHash::new(hash) {
            Ok(parsed) => self.argon.verify_password(secret, &parsed).is_ok(),
            Err(_) => false,
        };
        secret.zeroize();
        matched
    }

    /// [`hash`](Self::hash) on the blocking pool. Consumes and wipes `secret`.
    pub async fn hash_owned(&self, mut secret: Vec<u8>) -> Result<String, PasswordHashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || {
            let result = hasher.hash(&mut secret);
            secret.zeroize();
            result
        })
        .await
        .map_err(|e| PasswordHashError::Task(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking pool. Consumes and wipes `secret`.
    pub async fn verify_owned(&self, mut secret: Vec<u8>, hash: String) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || {
            let matched = hasher.verify(&mut secret, &hash);
            secret.zeroize();
            matched
        })
        .await
        .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(PasswordHashConfig {
        time_cost: 1,
        memory_cost_kib: 8,
        parallelism: 1,
    })
    .unwrap()
}
