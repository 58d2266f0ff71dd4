//! The two ends of the external-login redirect.
//!
//! `authorize` parks a fresh [`AuthorizationRequest`] in the handshake cookie
//! and sends the browser to the provider. `callback` takes it back out (the
//! cookie is cleared on every outcome), checks `state`, redeems the code and
//! hands the asserted identity to the completion handler.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::SignedCookieJar;
use chrono::Utc;
use tracing::{error, info, warn};

use inkwell_auth::ExternalLoginError;

use crate::app::dto::{self, CallbackParams};
use crate::app::errors::{self, json_error};
use crate::app::state::AppState;
use crate::oauth::AuthorizationRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth2/authorize", get(authorize))
        .route("/oauth2/callback", get(callback))
}

fn not_configured() -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        "not_found",
        "external login is not configured",
    )
}

fn failed() -> Response {
    errors::external_error_to_response(&ExternalLoginError::AssertionMissing)
}

/// GET /auth/oauth2/authorize
pub async fn authorize(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(provider) = state.provider.as_ref() else {
        return not_configured();
    };

    let request = provider.authorization_request();
    let jar = state.handshake.save(Some(&request), jar, Utc::now());
    info!(provider = %request.provider, "external login started");

    (
        jar,
        (StatusCode::FOUND, [(LOCATION, request.authorization_uri)]),
    )
        .into_response()
}

/// GET /auth/oauth2/callback
pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (jar, pending) = state
        .handshake
        .remove::<AuthorizationRequest>(jar, Utc::now());
    (jar, complete(&state, pending, params).await).into_response()
}

async fn complete(
    state: &AppState,
    pending: Option<AuthorizationRequest>,
    params: CallbackParams,
) -> Response {
    let Some(provider) = state.provider.as_ref() else {
        return not_configured();
    };

    if let Some(code) = params.error.as_deref() {
        warn!(
            kind = "provider_error",
            error = %code,
            description = params.error_description.as_deref().unwrap_or(""),
            "external login refused by provider"
        );
        return failed();
    }

    let Some(pending) = pending else {
        warn!(kind = "handshake_missing", "no external login in flight");
        return failed();
    };
    if pending.provider != provider.name() {
        warn!(kind = "handshake_mismatch", stored = %pending.provider, "handshake is for another provider");
        return failed();
    }
    if params.state.as_deref() != Some(pending.state.as_str()) {
        warn!(kind = "state_mismatch", "callback state does not match handshake");
        return failed();
    }
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        warn!(kind = "code_missing", "callback carries no authorization code");
        return failed();
    };

    let identity = match provider.exchange(&pending, code).await {
        Ok(identity) => identity,
        Err(e) => {
            error!(kind = "exchange_failed", error = %e, "code exchange failed");
            return failed();
        }
    };

    match state.auth.complete_external_login(identity, Utc::now()).await {
        Ok(response) => dto::ok(StatusCode::OK, "login successful", response),
        Err(e) => errors::external_error_to_response(&e),
    }
}
