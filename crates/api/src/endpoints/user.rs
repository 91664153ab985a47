//! Per-user endpoints: assignment, queues and notifications.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
};
use chrono::{DateTime, Utc};
use janta_common::AppResult;
use janta_db::entities::notification;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::reports::{ListQuery, ReportListResponse, ReportResponse};
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Assign request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignReportRequest {
    #[validate(length(min = 1))]
    pub report_id: String,
    #[validate(length(min = 1))]
    pub staff_id: String,
}

/// Notification response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub report_id: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notification::Model> for NotificationResponse {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            report_id: n.report_id,
            message: n.message,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

/// Notifications response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: u64,
}

/// Cleared count.
#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub deleted: u64,
}

/// Bind a report to a staff member.
async fn assign_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AssignReportRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    req.validate()?;
    let report = state
        .assignment_service
        .assign(&user, &req.report_id, &req.staff_id)
        .await?;
    Ok(ApiResponse::ok(ReportResponse::at(report, Utc::now())))
}

/// Reports waiting for the caller to accept or reject.
async fn reports_for_verification(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.resolution_service.pending_for(&user).await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// Reports assigned to the calling staff member.
async fn reports_assigned(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.report_service.list_assigned_to(&user).await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// Reports in the caller's departments.
async fn departmental_reports(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.report_service.list_departmental(&user).await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// The caller's notifications.
async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<NotificationsListResponse>> {
    let notifications = state.notification_service.list(&user.id).await?;
    let unread_count = state.notification_service.count_unread(&user.id).await?;
    Ok(ApiResponse::ok(NotificationsListResponse {
        notifications: notifications.into_iter().map(Into::into).collect(),
        unread_count,
    }))
}

/// Remove one notification.
async fn remove_notification(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.notification_service.remove(&user.id, &id).await?;
    Ok(response::ok())
}

/// Remove all of the caller's notifications.
async fn clear_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ClearedResponse>> {
    let deleted = state.notification_service.clear(&user.id).await?;
    Ok(ApiResponse::ok(ClearedResponse { deleted }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assignReport", patch(assign_report))
        .route("/reportForVerification", get(reports_for_verification))
        .route("/reportsAssigned", get(reports_assigned))
        .route("/departmentalReport", get(departmental_reports))
        .route(
            "/notifyForOverdue",
            get(list_notifications).delete(clear_notifications),
        )
        .route("/notifyForOverdueRem/{id}", patch(remove_notification))
}
