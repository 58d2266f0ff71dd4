use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use inkwell_auth::{AuthOutcome, TrustContext};

use crate::app::errors::rejection_response;
use crate::app::state::AppState;

/// Resolve the caller for every `/api/v1` request.
///
/// Requests without a bearer credential pass through anonymously; the
/// extractors in [`crate::context`] decide whether a route needs more.
/// A credential that is present but fails any check ends the request here.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    // Only this middleware may vouch for a caller.
    req.extensions_mut().remove::<TrustContext>();

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match state.auth.authenticate(header.as_deref(), Utc::now()).await {
        Ok(AuthOutcome::Anonymous) => next.run(req).await,
        Ok(AuthOutcome::Authenticated(ctx)) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(rejection) => rejection_response(&rejection),
    }
}
