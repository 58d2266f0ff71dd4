use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::app::dto::{self, LoginRequest, SignupRequest};
use crate::app::errors;
use crate::app::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
}

/// POST /auth/login
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let LoginRequest { username, password } = body;
    match state.auth.login(&username, password, Utc::now()).await {
        Ok(response) => dto::ok(StatusCode::OK, "login successful", response),
        Err(e) => errors::login_error_to_response(e),
    }
}

/// POST /auth/signup
pub async fn signup(State(state): State<AppState>, Json(body): Json<SignupRequest>) -> Response {
    match state.auth.signup(body.into()).await {
        Ok(profile) => dto::ok(StatusCode::CREATED, "account created", profile),
        Err(e) => errors::login_error_to_response(e),
    }
}
