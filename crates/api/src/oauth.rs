//! Identity-provider client: authorization-code flow with PKCE (S256).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use inkwell_auth::ExternalIdentity;

use crate::config::OAuthSettings;

/// Pending authorization request, parked in the handshake cookie between the
/// redirect out and the redirect back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub provider: String,
    pub authorization_uri: String,
    pub redirect_uri: String,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} failed with status {status}: {detail}")]
    Endpoint {
        operation: &'static str,
        status: u16,
        detail: String,
    },
}

/// The provider side of an external login.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Start a new handshake: fresh state, fresh PKCE verifier.
    fn authorization_request(&self) -> AuthorizationRequest;

    /// Redeem `code` and fetch the asserted identity.
    ///
    /// `Ok(None)` means the provider answered but vouched for nobody usable.
    async fn exchange(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<Option<ExternalIdentity>, ProviderError>;
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 64-character URL-safe code verifier (RFC 7636 allows 43-128).
pub fn generate_code_verifier() -> String {
    random_token(48)
}

/// `BASE64URL(SHA256(verifier))`.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn generate_state() -> String {
    random_token(16)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    settings: OAuthSettings,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(ProviderError::Endpoint {
            operation,
            status,
            detail,
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn name(&self) -> &str {
        &self.settings.provider
    }

    fn authorization_request(&self) -> AuthorizationRequest {
        let state = generate_state();
        let code_verifier = generate_code_verifier();
        let challenge = code_challenge(&code_verifier);

        let mut url = self.settings.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", self.settings.redirect_uri.as_str())
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest {
            provider: self.settings.provider.clone(),
            authorization_uri: url.into(),
            redirect_uri: self.settings.redirect_uri.to_string(),
            state,
            code_verifier,
        }
    }

    async fn exchange(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<Option<ExternalIdentity>, ProviderError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("code_verifier", request.code_verifier.as_str()),
        ];
        let response = self
            .http
            .post(self.settings.token_url.clone())
            .form(&params)
            .send()
            .await?;
        let token: TokenResponse = Self::ensure_success(response, "token exchange")
            .await?
            .json()
            .await?;

        let response = self
            .http
            .get(self.settings.userinfo_url.clone())
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let info: UserInfo = Self::ensure_success(response, "userinfo request")
            .await?
            .json()
            .await?;

        if info.email_verified == Some(false) {
            debug!(provider = %self.settings.provider, "provider reports email as unverified");
            return Ok(None);
        }

        Ok(Some(ExternalIdentity {
            provider: self.settings.provider.clone(),
            email: info.email,
            display_name: info.name,
        }))
    }
}
