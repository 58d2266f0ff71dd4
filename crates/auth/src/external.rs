//! Completion of an external (identity-provider) login.
//!
//! ```text
//! callback ─▶ identity? ──no──▶ AssertionMissing
//!                │yes
//!                ▼
//!        find by email ──found──────────┐
//!                │none                  │
//!                ▼                      ▼
//!           provision ───────────▶ issue token ─▶ LoginResponse
//! ```
//!
//! Every failure is reported to the client as the same unauthorized outcome;
//! the variants exist for server-side logs.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use zeroize::Zeroize;

use inkwell_core::Email;

use crate::Role;
use crate::claims::TokenError;
use crate::codec::TokenCodec;
use crate::directory::{DirectoryError, UserDirectory};
use crate::password::{PasswordHashError, PasswordHasher};
use crate::user::{AccountOrigin, LoginResponse, NewUser, User};
use crate::username::generate_username;

const PLACEHOLDER_SECRET_BYTES: usize = 32;
const FIRST_NAME_MAX_LEN: usize = 30;

/// Attributes the provider vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalLoginError {
    #[error("external authentication failed")]
    AssertionMissing,

    #[error("external authentication failed")]
    DataConflict(String),

    #[error("external authentication failed")]
    Provisioning(String),

    #[error("external authentication failed")]
    Token(TokenError),
}

impl ExternalLoginError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExternalLoginError::AssertionMissing => "assertion_missing",
            ExternalLoginError::DataConflict(_) => "data_conflict",
            ExternalLoginError::Provisioning(_) => "provisioning_failure",
            ExternalLoginError::Token(_) => "token_issue",
        }
    }

    /// Server-side detail; never sent to the client.
    pub fn detail(&self) -> String {
        match self {
            ExternalLoginError::AssertionMissing => "no usable identity in assertion".to_string(),
            ExternalLoginError::DataConflict(d) | ExternalLoginError::Provisioning(d) => d.clone(),
            ExternalLoginError::Token(e) => e.to_string(),
        }
    }
}

impl From<DirectoryError> for ExternalLoginError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Conflict(d) => ExternalLoginError::DataConflict(d),
            other => ExternalLoginError::Provisioning(other.to_string()),
        }
    }
}

impl From<PasswordHashError> for ExternalLoginError {
    fn from(value: PasswordHashError) -> Self {
        ExternalLoginError::Provisioning(value.to_string())
    }
}

#[derive(Clone)]
pub struct ExternalLoginHandler {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserDirectory>,
    hasher: PasswordHasher,
}

impl core::fmt::Debug for ExternalLoginHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExternalLoginHandler").finish_non_exhaustive()
    }
}

impl ExternalLoginHandler {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserDirectory>, hasher: PasswordHasher) -> Self {
        Self {
            codec,
            users,
            hasher,
        }
    }

    /// Resolve or provision the local account for `identity` and issue a token.
    ///
    /// `None` means the provider completed without asserting anyone.
    pub async fn complete(
        &self,
        identity: Option<ExternalIdentity>,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, ExternalLoginError> {
        let result = self.complete_inner(identity, now).await;
        if let Err(e) = &result {
            match e {
                ExternalLoginError::AssertionMissing => {
                    warn!(kind = e.kind(), "external login rejected")
                }
                _ => error!(kind = e.kind(), detail = %e.detail(), "external login failed"),
            }
        }
        result
    }

    async fn complete_inner(
        &self,
        identity: Option<ExternalIdentity>,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, ExternalLoginError> {
        let identity = identity.ok_or(ExternalLoginError::AssertionMissing)?;
        let email = identity
            .email
            .as_deref()
            .and_then(|raw| Email::parse(raw).ok())
            .ok_or(ExternalLoginError::AssertionMissing)?;

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => self.provision(&identity, email).await?,
        };

        let token = self
            .codec
            .issue(&user.username, &user.roles, now)
            .map_err(ExternalLoginError::Token)?;
        info!(username = %user.username, provider = %identity.provider, "external login completed");

        Ok(LoginResponse {
            token,
            user: user.profile(),
        })
    }

    async fn provision(
        &self,
        identity: &ExternalIdentity,
        email: Email,
    ) -> Result<User, ExternalLoginError> {
        let display_name = identity
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email_local_part(&email));

        let username = generate_username(&display_name, &*self.users).await?;
        let password_hash = self.hasher.hash_owned(placeholder_secret()).await?;

        let created = self
            .users
            .create_user(NewUser {
                username,
                email: email.clone(),
                first_name: display_name.chars().take(FIRST_NAME_MAX_LEN).collect(),
                last_name: None,
                password_hash,
                roles: vec![Role::User],
                origin: AccountOrigin::External {
                    provider: identity.provider.clone(),
                },
            })
            .await;

        match created {
            Ok(user) => {
                info!(username = %user.username, provider = %identity.provider, "provisioned external account");
                Ok(user)
            }
            // A concurrent callback for the same email may have won the race.
            Err(DirectoryError::Conflict(detail)) => self
                .users
                .find_by_email(&email)
                .await?
                .ok_or(ExternalLoginError::DataConflict(detail)),
            Err(e) => Err(e.into()),
        }
    }
}

fn email_local_part(email: &Email) -> String {
    email
        .as_str()
        .split_once('@')
        .map(|(local, _)| local.to_string())
        .unwrap_or_default()
}

/// Random bytes, base64 encoded, that nobody ever sees.
fn placeholder_secret() -> Vec<u8> {
    let mut raw = [0u8; PLACEHOLDER_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    let encoded = URL_SAFE_NO_PAD.encode(raw).into_bytes();
    raw.zeroize();
    encoded
}
