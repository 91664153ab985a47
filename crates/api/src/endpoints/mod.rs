//! API endpoints.

mod departments;
mod reports;
mod user;

use axum::Router;

use crate::middleware::AppState;

pub use reports::{ReportListResponse, ReportResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/departments", departments::router())
        .nest("/reports", reports::router())
        .nest("/user", user::router())
}
