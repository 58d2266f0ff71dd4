//! Direct username/password login and signup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use zeroize::Zeroize;

use inkwell_core::Email;

use crate::Role;
use crate::claims::TokenError;
use crate::codec::TokenCodec;
use crate::directory::{DirectoryError, UserDirectory};
use crate::password::{PasswordHashError, PasswordHasher};
use crate::user::{AccountOrigin, LoginResponse, NewUser, UserProfile};

pub const USERNAME_LEN: core::ops::RangeInclusive<usize> = 4..=12;
pub const PASSWORD_LEN: core::ops::RangeInclusive<usize> = 4..=20;
const NAME_MAX_LEN: usize = 30;
const DUMMY_SECRET: &[u8] = b"inkwell-no-such-account";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Unknown user, wrong password, or an account that has no password.
    #[error("username or password incorrect")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("user directory unavailable")]
    Unavailable(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Hash(#[from] PasswordHashError),
}

impl From<DirectoryError> for LoginError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Conflict(msg) => LoginError::Conflict(msg),
            DirectoryError::NotFound => LoginError::InvalidCredentials,
            DirectoryError::Unavailable(msg) => LoginError::Unavailable(msg),
        }
    }
}

/// Signup input.
///
/// Deliberately has no role field: self-registered accounts are always
/// [`Role::User`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Drop for NewAccount {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

#[derive(Clone)]
pub struct LoginService {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserDirectory>,
    hasher: PasswordHasher,
    // Hashed on first use; failed logins without a stored hash verify
    // against it so they cost as much as a wrong password.
    dummy_hash: Arc<OnceCell<String>>,
}

impl core::fmt::Debug for LoginService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginService")
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl LoginService {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserDirectory>, hasher: PasswordHasher) -> Self {
        Self {
            codec,
            users,
            hasher,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Check a username/password pair and issue a token on success.
    ///
    /// The username match is case-insensitive. `password` is wiped whatever
    /// the outcome.
    pub async fn login(
        &self,
        username: &str,
        mut password: String,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, LoginError> {
        let user = match self.users.find_by_identifier(username.trim()).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.verify_against_dummy(password).await;
                warn!(username = %username, "login failed: unknown user");
                return Err(LoginError::InvalidCredentials);
            }
            Err(e) => {
                password.zeroize();
                return Err(e.into());
            }
        };

        if user.origin.is_external() {
            self.verify_against_dummy(password).await;
            warn!(username = %user.username, "login failed: externally provisioned account");
            return Err(LoginError::InvalidCredentials);
        }

        let matched = self
            .hasher
            .verify_owned(password.into_bytes(), user.password_hash.clone())
            .await;
        if !matched {
            warn!(username = %user.username, "login failed: wrong password");
            return Err(LoginError::InvalidCredentials);
        }

        let token = self.codec.issue(&user.username, &user.roles, now)?;
        info!(username = %user.username, "logged in");
        Ok(LoginResponse {
            token,
            user: user.profile(),
        })
    }

    async fn verify_against_dummy(&self, mut password: String) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hasher.hash_owned(DUMMY_SECRET.to_vec()))
            .await;
        match dummy {
            Ok(hash) => {
                let secret = core::mem::take(&mut password).into_bytes();
                self.hasher.verify_owned(secret, hash.clone()).await;
            }
            Err(e) => warn!(error = %e, "dummy password hash unavailable"),
        }
        password.zeroize();
    }

    /// Register a local account with role `USER`.
    pub async fn signup(&self, mut account: NewAccount) -> Result<UserProfile, LoginError> {
        let username = account.username.trim().to_string();
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(LoginError::Validation(
                "username should be between 4 and 12 characters".to_string(),
            ));
        }
        if !PASSWORD_LEN.contains(&account.password.chars().count()) {
            return Err(LoginError::Validation(
                "password should be between 4 and 20 characters".to_string(),
            ));
        }
        let email = Email::parse(&account.email).map_err(|e| LoginError::Validation(e.to_string()))?;
        let first_name = account.first_name.trim().to_string();
        if first_name.is_empty() || first_name.chars().count() > NAME_MAX_LEN {
            return Err(LoginError::Validation(
                "first name should be between 1 and 30 characters".to_string(),
            ));
        }

        let password = core::mem::take(&mut account.password);
        let password_hash = self.hasher.hash_owned(password.into_bytes()).await?;

        let user = self
            .users
            .create_user(NewUser {
                username,
                email,
                first_name,
                last_name: account
                    .last_name
                    .take()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                password_hash,
                roles: vec![Role::User],
                origin: AccountOrigin::Local,
            })
            .await?;

        info!(username = %user.username, "account created");
        Ok(user.profile())
    }
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

    fn service() -> (LoginService, Arc<TokenCodec>, Arc<InMemoryUserDirectory>) {
        let codec = Arc::new(TokenCodec::new(b"login-test-secret-login-test-sec", Duration::hours(1)));
        let users = Arc::new(InMemoryUserDirectory::new());
        let svc = LoginService::new(codec.clone(), users.clone(), cheap_hasher());
        (svc, codec, users)
    }

    fn account(username: &str, email: &str, password: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Ange".to_string(),
            last_name: Some("B".to_string()),
        }
    }

    #[tokio::test]
    async fn signup_then_login_issues_a_user_token() {
        let (svc, codec, _) = service();
        let profile = svc
            .signup(account("angebhd", "Ange@Example.com", "s3cret!"))
            .await
            .unwrap();
        assert_eq!(profile.roles, vec![Role::User]);
        assert_eq!(profile.email.as_str(), "ange@example.com");

        let response = svc.login("ANGEBHD", "s3cret!".to_string(), t0()).await.unwrap();
        assert_eq!(response.user.username, "angebhd");

        let claims = codec.verify(&response.token).unwrap();
        assert_eq!(claims.subject(), "angebhd");
        assert_eq!(claims.authorities(), vec!["ROLE_USER"]);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (svc, _, _) = service();
        svc.signup(account("angebhd", "ange@example.com", "s3cret!"))
            .await
            .unwrap();

        let wrong = svc.login("angebhd", "nope".to_string(), t0()).await.unwrap_err();
        let unknown = svc.login("ghost", "nope".to_string(), t0()).await.unwrap_err();
        assert_eq!(wrong, LoginError::InvalidCredentials);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_user_still_pays_for_a_hash_verification() {
        let (svc, _, _) = service();
        assert!(!svc.dummy_hash.initialized());

        let err = svc.login("ghost", "nope".to_string(), t0()).await.unwrap_err();
        assert_eq!(err, LoginError::InvalidCredentials);
        let dummy = svc.dummy_hash.get().unwrap();
        assert!(dummy.starts_with("$argon2id$"));

        // Computed once, shared by clones.
        let clone = svc.clone();
        clone.login("ghost2", "nope".to_string(), t0()).await.unwrap_err();
        assert_eq!(clone.dummy_hash.get(), Some(dummy));
        assert!(!cheap_hasher().verify(&mut b"nope".to_vec(), dummy));
    }

    #[tokio::test]
    async fn external_accounts_cannot_use_password_login() {
        let (svc, _, users) = service();
        users
            .create_user(NewUser {
                username: "goog_1".to_string(),
                email: Email::parse("g@example.com").unwrap(),
                first_name: "G".to_string(),
                last_name: None,
                password_hash: cheap_hasher().hash(&mut b"known".to_vec()).unwrap(),
                roles: vec![Role::User],
                origin: AccountOrigin::External {
                    provider: "google".to_string(),
                },
            })
            .await
            .unwrap();

        assert_eq!(
            svc.login("goog_1", "known".to_string(), t0()).await,
            Err(LoginError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn signup_validates_and_detects_conflicts() {
        let (svc, _, _) = service();
        assert!(matches!(
            svc.signup(account("abc", "a@example.com", "pass")).await,
            Err(LoginError::Validation(_))
        ));
        assert!(matches!(
            svc.signup(account("abcd", "a@example.com", "p")).await,
            Err(LoginError::Validation(_))
        ));
        assert!(matches!(
            svc.signup(account("abcd", "not-an-email", "pass")).await,
            Err(LoginError::Validation(_))
        ));

        svc.signup(account("abcd", "a@example.com", "pass")).await.unwrap();
        assert!(matches!(
            svc.signup(account("ABCD", "b@example.com", "pass")).await,
            Err(LoginError::Conflict(_))
        ));
    }
}
