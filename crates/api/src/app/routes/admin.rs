//! Token administration and admin role changes. Every handler takes [`AdminOnly`], so callers
//! without `ROLE_ADMIN` get `403` before any work happens.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::info;

use crate::app::dto::{self, BlacklistedResponse, RoleChangeRequest, TokenRequest};
use crate::app::errors;
use crate::app::state::AppState;
use crate::context::AdminOnly;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/view-token-payload", post(view_token_payload))
        .route("/blacklist", post(blacklist_token).get(list_blacklist))
        .route("/make-admin", post(make_admin))
        .route("/remove-admin", post(remove_admin))
}

/// POST /admin/view-token-payload
pub async fn view_token_payload(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Json(body): Json<TokenRequest>,
) -> Response {
    match state.auth.token_payload(&body.token) {
        Ok(payload) => dto::ok(StatusCode::OK, "token payload", payload),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /admin/blacklist
pub async fn blacklist_token(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(body): Json<TokenRequest>,
) -> Response {
    match state.auth.revoke_token(&body.token, Utc::now()) {
        Ok(expires_at) => {
            info!(admin = %admin.subject, %expires_at, "token blacklisted");
            dto::ok(
                StatusCode::OK,
                "token blacklisted",
                BlacklistedResponse { expires_at },
            )
        }
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// GET /admin/blacklist
pub async fn list_blacklist(State(state): State<AppState>, AdminOnly(_admin): AdminOnly) -> Response {
    let entries = state.auth.list_revoked_tokens(Utc::now());
    dto::ok(StatusCode::OK, format!("{} blacklisted token(s)", entries.len()), entries)
}

/// POST /admin/make-admin
pub async fn make_admin(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(body): Json<RoleChangeRequest>,
) -> Response {
    match state.auth.make_admin(&body.username).await {
        Ok(profile) => {
            info!(admin = %admin.subject, username = %profile.username, "admin role granted");
            dto::ok(StatusCode::OK, "admin role granted", profile)
        }
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /admin/remove-admin
///
/// Tokens already issued to the user keep their signature, but the next
/// request re-reads roles from the directory and is refused admin routes.
pub async fn remove_admin(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(body): Json<RoleChangeRequest>,
) -> Response {
    match state.auth.remove_admin(&body.username).await {
        Ok(profile) => {
            info!(admin = %admin.subject, username = %profile.username, "admin role withdrawn");
            dto::ok(StatusCode::OK, "admin role withdrawn", profile)
        }
        Err(e) => errors::admin_error_to_response(e),
    }
}
