use axum::http::StatusCode;
use axum::response::Response;

use crate::app::dto::{self, WhoAmIResponse};
use crate::context::Authenticated;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Authenticated(ctx): Authenticated) -> Response {
    dto::ok(
        StatusCode::OK,
        "authenticated",
        WhoAmIResponse {
            user_id: ctx.user_id.to_string(),
            roles: ctx.authorities(),
            subject: ctx.subject,
        },
    )
}
