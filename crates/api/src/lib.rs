//! HTTP API layer for Janta Garage.
//!
//! This crate provides the REST API and the live channel:
//!
//! - **Endpoints**: report lifecycle, assignment and notification routes
//! - **Extractors**: the authenticated user
//! - **Middleware**: bearer-token authentication
//! - **Streaming**: per-user WebSocket channel
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

use axum::{Router, routing::get};

pub use endpoints::router;
pub use middleware::AppState;
pub use streaming::streaming_handler;

/// Full application router: `/api/v1` plus the live channel, with
/// authentication applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/streaming", get(streaming_handler))
        .nest("/api/v1", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}
