use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use inkwell_auth::NewAccount;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<SignupRequest> for NewAccount {
    fn from(value: SignupRequest) -> Self {
        NewAccount {
            username: value.username,
            email: value.email,
            password: value.password,
            first_name: value.first_name,
            last_name: value.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Body of the role-change endpoints.
#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub username: String,
}

/// Query string the provider sends back to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }
}

pub fn ok<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Response {
    (status, Json(ApiResponse::new(status, message, data))).into_response()
}

#[derive(Debug, Serialize)]
pub struct BlacklistedResponse {
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
    pub subject: String,
    pub roles: Vec<String>,
}
