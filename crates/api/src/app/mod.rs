//! HTTP API application wiring (Axum router + shared state).
//!
//! - `state.rs`: what handlers share (auth core, provider, cookie key)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and the success envelope
//! - `errors.rs`: consistent error responses

use axum::Router;
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod state;

pub use state::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(state: AppState) -> Router {
    let api = routes::router().layer(ServiceBuilder::new().layer(
        axum::middleware::from_fn_with_state(state.clone(), middleware::authenticate),
    ));

    Router::new().nest(API_PREFIX, api).with_state(state)
}
