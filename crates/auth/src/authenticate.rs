//! Per-request authentication.
//!
//! ```text
//! no token ───────────────────────────────────────────────▶ Anonymous
//! token ─▶ revoked? ─▶ verify ─▶ expired? ─▶ user lookup ─▶ Authenticated
//!              │          │          │            │
//!              └──────────┴──────────┴────────────┴───────▶ Rejected
//! ```
//!
//! The authenticator returns a fresh [`TrustContext`] per call and keeps no
//! per-request state of its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::claims::TokenError;
use crate::codec::TokenCodec;
use crate::directory::UserDirectory;
use crate::principal::TrustContext;
use crate::revocation::RevocationRegistry;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a presented token was not accepted.
///
/// `Display` is the client-facing message. Everything else (which check
/// failed, directory errors) is for logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("token blacklisted")]
    Revoked,

    #[error("invalid authentication token")]
    InvalidToken(TokenError),

    #[error("token has expired")]
    Expired,

    #[error("invalid token, user not found")]
    UnknownSubject,

    #[error("authentication failed")]
    DirectoryUnavailable(String),
}

impl AuthRejection {
    /// Short machine-readable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthRejection::Revoked => "revoked",
            AuthRejection::InvalidToken(TokenError::InvalidSignature) => "invalid_signature",
            AuthRejection::InvalidToken(_) => "malformed",
            AuthRejection::Expired => "expired",
            AuthRejection::UnknownSubject => "unknown_subject",
            AuthRejection::DirectoryUnavailable(_) => "directory_unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No usable bearer credential; continue without a trust context.
    Anonymous,
    Authenticated(TrustContext),
}

impl AuthOutcome {
    pub fn trust_context(&self) -> Option<&TrustContext> {
        match self {
            AuthOutcome::Anonymous => None,
            AuthOutcome::Authenticated(ctx) => Some(ctx),
        }
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// Returns `None` when the header is missing, uses another scheme, or
/// carries an empty token.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    revocations: Arc<RevocationRegistry>,
    users: Arc<dyn UserDirectory>,
}

impl core::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authenticator")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(
        codec: Arc<TokenCodec>,
        revocations: Arc<RevocationRegistry>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            codec,
            revocations,
            users,
        }
    }

    /// Run the full check sequence for one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthRejection> {
        let Some(token) = bearer_token(authorization) else {
            return Ok(AuthOutcome::Anonymous);
        };

        match self.resolve(token, now).await {
            Ok(ctx) => {
                debug!(subject = %ctx.subject, "request authenticated");
                Ok(AuthOutcome::Authenticated(ctx))
            }
            Err(rejection) => {
                match &rejection {
                    AuthRejection::DirectoryUnavailable(detail) => {
                        warn!(kind = rejection.kind(), detail = %detail, "authentication rejected");
                    }
                    _ => warn!(kind = rejection.kind(), "authentication rejected"),
                }
                Err(rejection)
            }
        }
    }

    async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<TrustContext, AuthRejection> {
        if self.revocations.is_revoked(token, now) {
            return Err(AuthRejection::Revoked);
        }

        let claims = self.codec.verify(token).map_err(AuthRejection::InvalidToken)?;
        if claims.is_expired(now) {
            return Err(AuthRejection::Expired);
        }

        let user = self
            .users
            .find_by_identifier(claims.subject())
            .await
            .map_err(|e| AuthRejection::DirectoryUnavailable(e.to_string()))?
            .ok_or(AuthRejection::UnknownSubject)?;

        Ok(TrustContext::for_user(&user))
    }
}
