//! Process configuration, read once from the environment at start-up.

use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use axum_extra::extract::cookie::Key;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::warn;
use url::Url;

use inkwell_auth::AdminBootstrap;

const DEV_JWT_SECRET: &[u8] = b"inkwell-dev-secret-do-not-use-in-production";
const MIN_COOKIE_KEY_BYTES: usize = 64;
/// Longest accepted token lifetime (one year).
const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

/// External identity provider (authorization-code flow).
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub scopes: Vec<String>,
}

impl core::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub token_lifetime: chrono::Duration,
    pub cookie_key: Key,
    pub cookie_secure: bool,
    pub sweep_interval: StdDuration,
    pub oauth: Option<OAuthSettings>,
    pub admin: Option<AdminBootstrap>,
    pub database_url: Option<String>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("token_lifetime", &self.token_lifetime)
            .field("cookie_secure", &self.cookie_secure)
            .field("sweep_interval", &self.sweep_interval)
            .field("oauth", &self.oauth.as_ref().map(|o| &o.provider))
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(v) => v.parse().map_err(|e| invalid("BIND_ADDR", format!("{e}")))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(v) => STANDARD
                .decode(v)
                .map_err(|e| invalid("JWT_SECRET", format!("not base64: {e}")))?,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_vec()
            }
        };
        if jwt_secret.len() < 32 {
            return Err(invalid("JWT_SECRET", "must decode to at least 32 bytes"));
        }

        let token_lifetime = parse_token_lifetime(parse_secs(&get, "JWT_EXPIRE_AFTER_SECS", 3600)?)?;

        let cookie_key = match get("COOKIE_KEY") {
            Some(v) => {
                let bytes = STANDARD
                    .decode(v)
                    .map_err(|e| invalid("COOKIE_KEY", format!("not base64: {e}")))?;
                if bytes.len() < MIN_COOKIE_KEY_BYTES {
                    return Err(invalid("COOKIE_KEY", "must decode to at least 64 bytes"));
                }
                Key::from(bytes.as_slice())
            }
            None => {
                warn!("COOKIE_KEY not set; handshake cookies will not survive a restart");
                Key::generate()
            }
        };

        let cookie_secure = match get("COOKIE_SECURE") {
            Some(v) => parse_bool(&v).ok_or_else(|| invalid("COOKIE_SECURE", "expected true or false"))?,
            None => true,
        };

        let sweep_interval = StdDuration::from_secs(parse_secs(&get, "REVOCATION_SWEEP_SECS", 600)?);

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_lifetime,
            cookie_key,
            cookie_secure,
            sweep_interval,
            oauth: oauth_settings(&get)?,
            admin: admin_bootstrap(&get),
            database_url: get("DATABASE_URL"),
        })
    }
}

fn parse_secs<G>(get: &G, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(v) => match v.parse::<u64>() {
            Ok(0) => Err(invalid(var, "must be positive")),
            Ok(n) => Ok(n),
            Err(e) => Err(invalid(var, format!("{e}"))),
        },
        None => Ok(default),
    }
}

fn parse_token_lifetime(secs: u64) -> Result<chrono::Duration, ConfigError> {
    if secs > MAX_TOKEN_LIFETIME_SECS {
        return Err(invalid(
            "JWT_EXPIRE_AFTER_SECS",
            format!("must be at most {MAX_TOKEN_LIFETIME_SECS}"),
        ));
    }
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| invalid("JWT_EXPIRE_AFTER_SECS", "out of range"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| invalid(var, format!("{e}")))
}

fn oauth_settings<G>(get: &G) -> Result<Option<OAuthSettings>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(client_id) = get("OAUTH_CLIENT_ID") else {
        return Ok(None);
    };
    let client_secret = get("OAUTH_CLIENT_SECRET")
        .ok_or_else(|| invalid("OAUTH_CLIENT_SECRET", "required when OAUTH_CLIENT_ID is set"))?;
    let redirect_uri = get("OAUTH_REDIRECT_URI")
        .ok_or_else(|| invalid("OAUTH_REDIRECT_URI", "required when OAUTH_CLIENT_ID is set"))?;

    let url_or = |var: &'static str, default: &str| -> Result<Url, ConfigError> {
        parse_url(var, &get(var).unwrap_or_else(|| default.to_string()))
    };

    Ok(Some(OAuthSettings {
        provider: get("OAUTH_PROVIDER").unwrap_or_else(|| "google".to_string()),
        client_id,
        client_secret,
        redirect_uri: parse_url("OAUTH_REDIRECT_URI", &redirect_uri)?,
        auth_url: url_or("OAUTH_AUTH_URL", "https://accounts.google.com/o/oauth2/v2/auth")?,
        token_url: url_or("OAUTH_TOKEN_URL", "https://oauth2.googleapis.com/token")?,
        userinfo_url: url_or(
            "OAUTH_USERINFO_URL",
            "https://openidconnect.googleapis.com/v1/userinfo",
        )?,
        scopes: get("OAUTH_SCOPES")
            .unwrap_or_else(|| "openid,email,profile".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }))
}

fn admin_bootstrap<G>(get: &G) -> Option<AdminBootstrap>
where
    G: Fn(&str) -> Option<String>,
{
    let email = get("ADMIN_EMAIL")?;
    Some(AdminBootstrap {
        username: get("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
        password: get("ADMIN_PASSWORD").unwrap_or_default(),
        first_name: get("ADMIN_FIRST_NAME").unwrap_or_else(|| "Admin".to_string()),
        last_name: get("ADMIN_LAST_NAME"),
        email,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.token_lifetime, chrono::Duration::hours(1));
        assert!(cfg.cookie_secure);
        assert_eq!(cfg.sweep_interval, StdDuration::from_secs(600));
        assert!(cfg.oauth.is_none());
        assert!(cfg.admin.is_none());
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn secrets_are_base64() {
        let secret = STANDARD.encode([7u8; 32]);
        let cfg = config(&[("JWT_SECRET", &secret)]).unwrap();
        assert_eq!(cfg.jwt_secret, vec![7u8; 32]);

        assert!(config(&[("JWT_SECRET", "%%%")]).is_err());
        assert!(config(&[("JWT_SECRET", &STANDARD.encode([1u8; 8]))]).is_err());
        assert!(config(&[("COOKIE_KEY", &STANDARD.encode([1u8; 16]))]).is_err());
    }

    #[test]
    fn cookie_secure_can_be_disabled_explicitly() {
        assert!(!config(&[("COOKIE_SECURE", "false")]).unwrap().cookie_secure);
        assert!(config(&[("COOKIE_SECURE", "maybe")]).is_err());
    }

    #[test]
    fn oauth_requires_secret_and_redirect() {
        assert!(config(&[("OAUTH_CLIENT_ID", "cid")]).is_err());

        let cfg = config(&[
            ("OAUTH_CLIENT_ID", "cid"),
            ("OAUTH_CLIENT_SECRET", "shh"),
            ("OAUTH_REDIRECT_URI", "http://localhost:8080/api/v1/auth/oauth2/callback"),
            ("OAUTH_SCOPES", "openid, email"),
        ])
        .unwrap();
        let oauth = cfg.oauth.unwrap();
        assert_eq!(oauth.provider, "google");
        assert_eq!(oauth.scopes, vec!["openid", "email"]);
        assert_eq!(oauth.token_url.as_str(), "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn admin_needs_an_email() {
        assert!(config(&[("ADMIN_USERNAME", "root")]).unwrap().admin.is_none());

        let cfg = config(&[("ADMIN_EMAIL", "root@example.com"), ("ADMIN_PASSWORD", "pw")]).unwrap();
        let admin = cfg.admin.unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.email, "root@example.com");
    }

    #[test]
    fn token_lifetime_is_bounded() {
        let cfg = config(&[("JWT_EXPIRE_AFTER_SECS", "86400")]).unwrap();
        assert_eq!(cfg.token_lifetime, chrono::Duration::days(1));

        // Would wrap negative if cast straight to i64.
        assert!(config(&[("JWT_EXPIRE_AFTER_SECS", "18446744073709551615")]).is_err());
        // Positive, but overflows the expiry timestamp.
        assert!(config(&[("JWT_EXPIRE_AFTER_SECS", "1000000000000000")]).is_err());
        assert!(config(&[("JWT_EXPIRE_AFTER_SECS", "31536001")]).is_err());
        assert!(config(&[("JWT_EXPIRE_AFTER_SECS", "31536000")]).is_ok());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(config(&[("REVOCATION_SWEEP_SECS", "0")]).is_err());
        assert!(config(&[("JWT_EXPIRE_AFTER_SECS", "abc")]).is_err());
    }
}
