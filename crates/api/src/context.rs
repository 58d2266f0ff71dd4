use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::Response;

use inkwell_auth::{Role, TrustContext};

use crate::app::errors::{json_error, unauthorized};

/// Handler argument for routes that need a caller.
///
/// The trust context is only ever placed in request extensions by the
/// authentication middleware, so its presence means every check passed.
#[derive(Debug, Clone)]
pub struct Authenticated(pub TrustContext);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TrustContext>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| unauthorized("authentication required"))
    }
}

/// Like [`Authenticated`], but the caller must also hold `ROLE_ADMIN`.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub TrustContext);

#[async_trait]
impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(ctx) = Authenticated::from_request_parts(parts, state).await?;
        if !ctx.has_role(Role::Admin) {
            tracing::warn!(subject = %ctx.subject, "admin route refused");
            return Err(json_error(StatusCode::FORBIDDEN, "forbidden", "admin role required"));
        }
        Ok(AdminOnly(ctx))
    }
}
