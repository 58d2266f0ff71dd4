use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// Verified token claims.
///
/// Only [`TokenCodec::verify`](crate::TokenCodec::verify) produces values of
/// this type, so holding one means the signature has already been checked.
/// Expiry is *not* implied; use [`Claims::is_expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    subject: String,
    roles: Vec<Role>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Claims {
    pub(crate) fn from_wire(wire: WireClaims) -> Result<Self, TokenError> {
        if wire.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        let roles = wire
            .roles
            .iter()
            .map(|a| Role::from_authority(a).ok_or(TokenError::Malformed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            subject: wire.sub,
            roles,
            issued_at: wire.iat,
            expires_at: wire.exp,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Roles in claim form (`ROLE_*`).
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `now >= expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// On-the-wire claim set. Timestamps are JWT NumericDate (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireClaims {
    pub sub: String,
    pub roles: Vec<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The string is not a three-segment token, or its segments do not decode
    /// into the expected claim set.
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token subject must not be empty")]
    EmptySubject,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}
