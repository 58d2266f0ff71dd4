use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use inkwell_auth::{AdminError, AuthRejection, ExternalLoginError, LoginError};

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn unauthorized(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// Every rejection shares status and code; only the message differs.
pub fn rejection_response(rejection: &AuthRejection) -> Response {
    unauthorized(rejection.to_string())
}

pub fn login_error_to_response(err: LoginError) -> Response {
    match err {
        LoginError::InvalidCredentials => unauthorized(err.to_string()),
        LoginError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LoginError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LoginError::Unavailable(detail) => {
            error!(%detail, "user directory unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "service temporarily unavailable",
            )
        }
        LoginError::Token(e) => {
            error!(error = %e, "token issue failed");
            internal_error()
        }
        LoginError::Hash(e) => {
            error!(error = %e, "password hashing failed");
            internal_error()
        }
    }
}

pub fn admin_error_to_response(err: AdminError) -> Response {
    match err {
        AdminError::UserNotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        AdminError::Unavailable(detail) => {
            error!(%detail, "user directory unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "service temporarily unavailable",
            )
        }
        AdminError::InvalidToken(_) | AdminError::AlreadyExpired => {
            json_error(StatusCode::BAD_REQUEST, "bad_request", err.to_string())
        }
    }
}

/// The handler has already logged the detail.
pub fn external_error_to_response(err: &ExternalLoginError) -> Response {
    unauthorized(err.to_string())
}

pub fn internal_error() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}
