//! Operator surface: token introspection, revocation, role changes, admin
//! bootstrap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroize;

use inkwell_core::Email;

use crate::Role;
use crate::claims::TokenError;
use crate::roles::canonical_roles;
use crate::codec::TokenCodec;
use crate::directory::{DirectoryError, UserDirectory};
use crate::password::{PasswordHashError, PasswordHasher};
use crate::revocation::{RevocationRegistry, RevokedToken};
use crate::user::{AccountOrigin, NewUser, User, UserProfile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("invalid token")]
    InvalidToken(#[from] TokenError),

    #[error("token has already expired")]
    AlreadyExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("user directory unavailable")]
    Unavailable(String),
}

impl From<DirectoryError> for AdminError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::NotFound => AdminError::UserNotFound,
            other => AdminError::Unavailable(other.to_string()),
        }
    }
}

/// Decoded view of a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPayload {
    pub username: String,
    pub roles: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One row of the blacklist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlacklistEntry {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub time_remaining: String,
}

impl From<RevokedToken> for BlacklistEntry {
    fn from(value: RevokedToken) -> Self {
        Self {
            time_remaining: value.time_remaining(),
            token: value.token,
            expires_at: value.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct AdminService {
    codec: Arc<TokenCodec>,
    revocations: Arc<RevocationRegistry>,
    users: Arc<dyn UserDirectory>,
}

impl core::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl AdminService {
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

    /// Decode a token after checking its signature. Expired tokens still decode.
    pub fn token_payload(&self, token: &str) -> Result<TokenPayload, AdminError> {
        let claims = self.codec.verify(token.trim())?;
        Ok(TokenPayload {
            username: claims.subject().to_string(),
            roles: claims.authorities(),
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        })
    }

    /// Revoke a verified, unexpired token until its own expiry.
    pub fn blacklist(&self, token: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AdminError> {
        let token = token.trim();
        let claims = match self.codec.verify_at(token, now) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Err(AdminError::AlreadyExpired),
            Err(e) => return Err(e.into()),
        };

        self.revocations.revoke(token, claims.expires_at());
        info!(subject = %claims.subject(), expires_at = %claims.expires_at(), "token revoked");
        Ok(claims.expires_at())
    }

    pub fn is_blacklisted(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.revocations.is_revoked(token.trim(), now)
    }

    /// Live blacklist entries. An empty list is a normal answer.
    pub fn blacklisted(&self, now: DateTime<Utc>) -> Vec<BlacklistEntry> {
        self.revocations
            .list_active(now)
            .into_iter()
            .map(BlacklistEntry::from)
            .collect()
    }

    /// Add [`Role::Admin`] to the account's roles.
    pub async fn make_admin(&self, username: &str) -> Result<UserProfile, AdminError> {
        let user = self.find(username).await?;
        if user.has_role(Role::Admin) {
            return Ok(user.profile());
        }

        let mut roles = user.roles.clone();
        roles.push(Role::Admin);
        let user = self.users.set_roles(&user.username, canonical_roles(&roles)).await?;
        Ok(user.profile())
    }

    /// Drop [`Role::Admin`]. The account keeps [`Role::User`], so it can still
    /// sign in.
    pub async fn remove_admin(&self, username: &str) -> Result<UserProfile, AdminError> {
        let user = self.find(username).await?;
        if !user.has_role(Role::Admin) {
            return Ok(user.profile());
        }

        let mut roles: Vec<Role> = user.roles.iter().copied().filter(|r| *r != Role::Admin).collect();
        roles.push(Role::User);
        let user = self.users.set_roles(&user.username, canonical_roles(&roles)).await?;
        Ok(user.profile())
    }

    async fn find(&self, username: &str) -> Result<User, AdminError> {
        self.users
            .find_by_identifier(username.trim())
            .await?
            .ok_or(AdminError::UserNotFound)
    }
}

/// Credentials for the admin account created at start-up.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl core::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Drop for AdminBootstrap {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(UserProfile),
    AlreadyExists,
    /// No admin configured.
    Skipped,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid admin email: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Hash(#[from] PasswordHashError),
}

/// Create the configured admin unless an account with that email or
/// username already exists.
pub async fn bootstrap_admin(
    config: Option<AdminBootstrap>,
    users: &dyn UserDirectory,
    hasher: &PasswordHasher,
) -> Result<BootstrapOutcome, BootstrapError> {
    let Some(mut config) = config else {
        info!("no admin configured, skipping bootstrap");
        return Ok(BootstrapOutcome::Skipped);
    };

    let email = Email::parse(&config.email).map_err(|e| BootstrapError::InvalidEmail(e.to_string()))?;
    if users.find_by_email(&email).await?.is_some()
        || users.username_taken(&config.username).await?
    {
        info!(username = %config.username, "admin account already exists");
        return Ok(BootstrapOutcome::AlreadyExists);
    }

    if config.password.is_empty() {
        warn!("admin password is empty");
    }
    let password = core::mem::take(&mut config.password);
    let password_hash = hasher.hash_owned(password.into_bytes()).await?;

    let user = users
        .create_user(NewUser {
            username: config.username.clone(),
            email,
            first_name: config.first_name.clone(),
            last_name: config.last_name.clone(),
            password_hash,
            roles: vec![Role::Admin],
            origin: AccountOrigin::Local,
        })
        .await?;

    info!(username = %user.username, "admin account created");
    Ok(BootstrapOutcome::Created(user.profile()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::directory::InMemoryUserDirectory;
    use crate::password::cheap_hasher;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn service() -> (AdminService, Arc<TokenCodec>) {
        let (svc, codec, _) = service_with_users();
        (svc, codec)
    }

    fn service_with_users() -> (AdminService, Arc<TokenCodec>, Arc<InMemoryUserDirectory>) {
        let codec = Arc::new(TokenCodec::new(b"admin-test-secret-admin-test-sec", Duration::hours(1)));
        let users = Arc::new(InMemoryUserDirectory::new());
        let svc = AdminService::new(codec.clone(), Arc::new(RevocationRegistry::new()), users.clone());
        (svc, codec, users)
    }

    fn admin_config() -> AdminBootstrap {
        AdminBootstrap {
            email: "admin@example.com".to_string(),
            username: "admin".to_string(),
            password: "change-me".to_string(),
            first_name: "Site".to_string(),
            last_name: Some("Admin".to_string()),
        }
    }

    #[test]
    fn payload_exposes_authorities_and_times() {
        let (svc, codec) = service();
        let token = codec.issue("alice", &[Role::User, Role::Admin], t0()).unwrap();

        let payload = svc.token_payload(&token).unwrap();
        assert_eq!(payload.username, "alice");
        assert_eq!(payload.roles, vec!["ROLE_USER", "ROLE_ADMIN"]);
        assert_eq!(payload.expires_at, t0() + Duration::hours(1));
    }

    #[test]
    fn payload_of_garbage_is_invalid() {
        let (svc, _) = service();
        assert_eq!(
            svc.token_payload("x.y.z"),
            Err(AdminError::InvalidToken(TokenError::Malformed))
        );
    }

    #[test]
    fn blacklist_then_list() {
        let (svc, codec) = service();
        assert!(svc.blacklisted(t0()).is_empty());

        let token = codec.issue("alice", &[Role::User], t0()).unwrap();
        let until = svc.blacklist(&token, t0()).unwrap();
        assert_eq!(until, t0() + Duration::hours(1));
        assert!(svc.is_blacklisted(&token, t0()));

        let listed = svc.blacklisted(t0() + Duration::minutes(20));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].token, token);
        assert_eq!(listed[0].time_remaining, "40 min left");
    }

    #[test]
    fn expired_tokens_are_not_blacklisted() {
        let (svc, codec) = service();
        let token = codec.issue("alice", &[Role::User], t0()).unwrap();
        assert_eq!(
            svc.blacklist(&token, t0() + Duration::hours(2)),
            Err(AdminError::AlreadyExpired)
        );
        assert!(svc.blacklisted(t0()).is_empty());
    }

    #[tokio::test]
    async fn bootstrap_creates_once() {
        let users = InMemoryUserDirectory::new();
        let hasher = cheap_hasher();

        let first = bootstrap_admin(Some(admin_config()), &users, &hasher).await.unwrap();
        let profile = match first {
            BootstrapOutcome::Created(profile) => profile,
            other => panic!("expected the admin to be created, got {other:?}"),
        };
        assert_eq!(profile.roles, vec![Role::Admin]);

        let second = bootstrap_admin(Some(admin_config()), &users, &hasher).await.unwrap();
        assert_eq!(second, BootstrapOutcome::AlreadyExists);
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn bootstrap_without_config_is_skipped() {
        let users = InMemoryUserDirectory::new();
        let outcome = bootstrap_admin(None, &users, &cheap_hasher()).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::Skipped);
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn admin_role_can_be_granted_and_withdrawn() {
        let (svc, _, users) = service_with_users();
        bootstrap_admin(Some(admin_config()), &*users, &cheap_hasher()).await.unwrap();

        let demoted = svc.remove_admin("ADMIN").await.unwrap();
        assert_eq!(demoted.roles, vec![Role::User]);
        let stored = users.find_by_identifier("admin").await.unwrap().unwrap();
        assert!(!stored.has_role(Role::Admin));

        // Idempotent in both directions.
        assert_eq!(svc.remove_admin("admin").await.unwrap().roles, vec![Role::User]);
        let promoted = svc.make_admin("admin").await.unwrap();
        assert_eq!(promoted.roles, vec![Role::User, Role::Admin]);
        assert_eq!(svc.make_admin("admin").await.unwrap().roles, vec![Role::User, Role::Admin]);
    }

    #[tokio::test]
    async fn role_change_for_unknown_user_is_not_found() {
        let (svc, _, _) = service_with_users();
        assert_eq!(svc.make_admin("ghost").await, Err(AdminError::UserNotFound));
        assert_eq!(svc.remove_admin("ghost").await, Err(AdminError::UserNotFound));
    }
}
