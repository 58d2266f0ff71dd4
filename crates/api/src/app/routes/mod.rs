use axum::Router;
use axum::routing::get;

use crate::app::state::AppState;

pub mod admin;
pub mod auth;
pub mod oauth;
pub mod system;

/// Everything served under the API prefix. Authentication runs in front of
/// all of it; individual handlers pick their extractor.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router().merge(oauth::router()))
        .nest("/admin", admin::router())
}
