use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Role;
use crate::admin::{AdminError, AdminService, BlacklistEntry, TokenPayload};
use crate::authenticate::{AuthOutcome, AuthRejection, Authenticator};
use crate::claims::{Claims, TokenError};
use crate::codec::TokenCodec;
use crate::directory::UserDirectory;
use crate::external::{ExternalIdentity, ExternalLoginError, ExternalLoginHandler};
use crate::login::{LoginError, LoginService, NewAccount};
use crate::password::PasswordHasher;
use crate::revocation::RevocationRegistry;
use crate::user::{LoginResponse, UserProfile};

/// The auth core as one injectable component.
///
/// Cheap to clone; every part is shared. The composition root owns the
/// revocation registry and is responsible for sweeping it
/// (see [`spawn_sweeper`](crate::spawn_sweeper)).
#[derive(Debug, Clone)]
pub struct AuthService {
    codec: Arc<TokenCodec>,
    authenticator: Authenticator,
    login: LoginService,
    external: ExternalLoginHandler,
    admin: AdminService,
}

impl AuthService {
    pub fn new(
        codec: TokenCodec,
        revocations: Arc<RevocationRegistry>,
        users: Arc<dyn UserDirectory>,
        hasher: PasswordHasher,
    ) -> Self {
        let codec = Arc::new(codec);
        Self {
            authenticator: Authenticator::new(codec.clone(), revocations.clone(), users.clone()),
            login: LoginService::new(codec.clone(), users.clone(), hasher.clone()),
            external: ExternalLoginHandler::new(codec.clone(), users.clone(), hasher),
            admin: AdminService::new(codec.clone(), revocations, users),
            codec,
        }
    }

    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthRejection> {
        self.authenticator.authenticate(authorization, now).await
    }

    pub fn issue_token(
        &self,
        subject: &str,
        roles: &[Role],
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.codec.issue(subject, roles, now)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.verify(token)
    }

    pub fn token_payload(&self, token: &str) -> Result<TokenPayload, AdminError> {
        self.admin.token_payload(token)
    }

    /// Returns the instant the revocation lapses (the token's own expiry).
    pub fn revoke_token(&self, token: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AdminError> {
        self.admin.blacklist(token, now)
    }

    pub fn is_token_revoked(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.admin.is_blacklisted(token, now)
    }

    pub fn list_revoked_tokens(&self, now: DateTime<Utc>) -> Vec<BlacklistEntry> {
        self.admin.blacklisted(now)
    }

    /// Grant `ROLE_ADMIN`. Takes effect on the user's next request.
    pub async fn make_admin(&self, username: &str) -> Result<UserProfile, AdminError> {
        self.admin.make_admin(username).await
    }

    /// Withdraw `ROLE_ADMIN`. Takes effect on the user's next request.
    pub async fn remove_admin(&self, username: &str) -> Result<UserProfile, AdminError> {
        self.admin.remove_admin(username).await
    }

    pub async fn login(
        &self,
        username: &str,
        password: String,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, LoginError> {
        self.login.login(username, password, now).await
    }

    pub async fn signup(&self, account: NewAccount) -> Result<UserProfile, LoginError> {
        self.login.signup(account).await
    }

    pub async fn complete_external_login(
        &self,
        identity: Option<ExternalIdentity>,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, ExternalLoginError> {
        self.external.complete(identity, now).await
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

    #[tokio::test]
    async fn external_and_direct_logins_share_the_downstream_contract() {
        let service = AuthService::new(
            TokenCodec::new(b"service-test-secret-service-test", Duration::hours(1)),
            Arc::new(RevocationRegistry::new()),
            Arc::new(InMemoryUserDirectory::new()),
            cheap_hasher(),
        );

        service
            .signup(NewAccount {
                username: "direct".to_string(),
                email: "direct@example.com".to_string(),
                password: "pass1234".to_string(),
                first_name: "Dee".to_string(),
                last_name: None,
            })
            .await
            .unwrap();
        let direct = service.login("direct", "pass1234".to_string(), t0()).await.unwrap();

        let external = service
            .complete_external_login(
                Some(ExternalIdentity {
                    provider: "google".to_string(),
                    email: Some("ext@example.com".to_string()),
                    display_name: Some("Ext Ernal".to_string()),
                }),
                t0(),
            )
            .await
            .unwrap();

        for response in [&direct, &external] {
            let auth = format!("Bearer {}", response.token);
            let outcome = service.authenticate(Some(&auth), t0()).await.unwrap();
            let ctx = outcome.trust_context().unwrap();
            assert_eq!(ctx.subject, response.user.username);
            assert_eq!(ctx.authorities(), vec!["ROLE_USER"]);
        }

        service.revoke_token(&external.token, t0()).unwrap();
        assert!(service.is_token_revoked(&external.token, t0()));
        assert_eq!(service.list_revoked_tokens(t0()).len(), 1);
        assert_eq!(
            service
                .authenticate(Some(&format!("Bearer {}", external.token)), t0())
                .await,
            Err(AuthRejection::Revoked)
        );
    }
}
