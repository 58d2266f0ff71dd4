//! Cookie-backed carrier for in-flight external-login state.
//!
//! There is no server-side session between the redirect to the provider and
//! the redirect back, so the pending authorization request travels in a
//! single signed cookie: JSON, then URL-safe unpadded base64, then HMAC
//! signed by the jar. One slot per browser; saving again overwrites it.
//!
//! The cookie's `Max-Age` only binds well-behaved browsers, so the payload
//! also records when it was parked and [`HandshakeCookies::load`] refuses it
//! once the TTL has passed.

use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, warn};

pub const HANDSHAKE_COOKIE: &str = "oauth2_auth_request";
pub const HANDSHAKE_TTL_SECS: i64 = 180;
const COOKIE_PATH: &str = "/";

/// What actually goes into the cookie.
#[derive(Serialize, Deserialize)]
struct Parked<S> {
    saved_at: DateTime<Utc>,
    state: S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeCookies {
    secure: bool,
    ttl: Duration,
}

impl HandshakeCookies {
    pub fn new(secure: bool) -> Self {
        Self {
            secure,
            ttl: Duration::seconds(HANDSHAKE_TTL_SECS),
        }
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    /// Park `state` in the cookie, or delete the cookie when `state` is `None`.
    pub fn save<T: Serialize>(
        &self,
        state: Option<&T>,
        jar: SignedCookieJar,
        now: DateTime<Utc>,
    ) -> SignedCookieJar {
        let Some(state) = state else {
            return jar.remove(removal_cookie());
        };

        match serde_json::to_vec(&Parked { saved_at: now, state }) {
            Ok(bytes) => {
                let cookie = Cookie::build((HANDSHAKE_COOKIE, URL_SAFE_NO_PAD.encode(bytes)))
                    .path(COOKIE_PATH)
                    .http_only(true)
                    .secure(self.secure)
                    .same_site(SameSite::Lax)
                    .max_age(self.ttl);
                jar.add(cookie)
            }
            Err(e) => {
                warn!(error = %e, "handshake state not serializable; clearing cookie");
                jar.remove(removal_cookie())
            }
        }
    }

    /// Read the parked state. Missing, forged, stale or undecodable cookies
    /// all read as "no handshake in flight".
    pub fn load<T: DeserializeOwned>(&self, jar: &SignedCookieJar, now: DateTime<Utc>) -> Option<T> {
        let cookie = jar.get(HANDSHAKE_COOKIE)?;
        let bytes = match URL_SAFE_NO_PAD.decode(cookie.value()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "handshake cookie is not base64");
                return None;
            }
        };
        let parked: Parked<T> = match serde_json::from_slice(&bytes) {
            Ok(parked) => parked,
            Err(e) => {
                debug!(error = %e, "handshake cookie does not decode");
                return None;
            }
        };
        let age = now.signed_duration_since(parked.saved_at);
        if age.num_seconds() >= self.ttl.whole_seconds() || age < chrono::Duration::zero() {
            debug!(saved_at = %parked.saved_at, "handshake cookie is stale");
            return None;
        }
        Some(parked.state)
    }

    /// [`load`](Self::load), then delete the cookie unconditionally.
    pub fn remove<T: DeserializeOwned>(
        &self,
        jar: SignedCookieJar,
        now: DateTime<Utc>,
    ) -> (SignedCookieJar, Option<T>) {
        let state = self.load(&jar, now);
        (jar.remove(removal_cookie()), state)
    }
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((HANDSHAKE_COOKIE, "")).path(COOKIE_PATH).build()
}
