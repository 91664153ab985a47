//! API middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use janta_core::{
    AssignmentService, NotificationService, ReportService, ResolutionService, UserChannelHub,
};
use janta_db::UserStoreRef;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub users: UserStoreRef,
    pub report_service: ReportService,
    pub resolution_service: ResolutionService,
    pub assignment_service: AssignmentService,
    pub notification_service: NotificationService,
    /// Live sessions connected to this instance.
    pub hub: Arc<UserChannelHub>,
}

/// Authentication middleware.
///
/// Resolves a bearer token to a user and stores it in the request
/// extensions. Requests without a valid token pass through unauthenticated.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    if let Some(token) = token {
        match state.users.find_by_token(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => {
                tracing::debug!("Unknown bearer token");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve bearer token");
            }
        }
    }

    next.run(req).await
}
