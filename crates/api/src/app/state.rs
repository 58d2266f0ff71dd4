use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use inkwell_auth::AuthService;

use crate::handshake::HandshakeCookies;
use crate::oauth::IdentityProvider;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    /// `None` when no external provider is configured.
    pub provider: Option<Arc<dyn IdentityProvider>>,
    pub handshake: HandshakeCookies,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(auth: AuthService, cookie_key: Key, cookie_secure: bool) -> Self {
        Self {
            auth: Arc::new(auth),
            provider: None,
            handshake: HandshakeCookies::new(cookie_secure),
            cookie_key,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

// Lets `SignedCookieJar` find its key.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
