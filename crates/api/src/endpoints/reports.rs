//! Report endpoints.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, patch, put},
};
use chrono::{DateTime, Utc};
use janta_common::{AppError, AppResult};
use janta_core::{
    CreateReportInput, EligibleStaff, Urgency, classify, next_recheck_at, sort_by_deadline,
    time_remaining_secs,
};
use janta_db::entities::{Departments, ReportStatus, Severity, UserSummary, report};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// `GeoJSON` point as returned to clients.
#[derive(Debug, Serialize)]
pub struct LocationResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

/// Report response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub departments: Departments,
    pub location: LocationResponse,
    pub status: ReportStatus,
    pub image_url: Option<String>,
    pub is_assigned: bool,
    pub assigned_to: Option<UserSummary>,
    pub assigned_by: Option<UserSummary>,
    #[serde(rename = "isNotifiedTOResolved")]
    pub is_notified_to_resolved: bool,
    pub is_overdue: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_comments: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Urgency at response time
    pub urgency: Urgency,
    /// Negative once the deadline has passed
    pub time_remaining_secs: Option<i64>,
}

impl ReportResponse {
    /// Render a report as seen at `now`.
    #[must_use]
    pub fn at(r: report::Model, now: DateTime<Utc>) -> Self {
        Self {
            urgency: classify(r.status, r.deadline, now),
            time_remaining_secs: time_remaining_secs(r.deadline, now),
            location: LocationResponse {
                kind: "Point",
                coordinates: [r.location_lng, r.location_lat],
            },
            id: r.id,
            title: r.title,
            description: r.description,
            severity: r.severity,
            departments: r.departments,
            status: r.status,
            image_url: r.image_url,
            is_assigned: r.is_assigned,
            assigned_to: r.assigned_to,
            assigned_by: r.assigned_by,
            is_notified_to_resolved: r.is_notified_to_resolved,
            is_overdue: r.is_overdue,
            deadline: r.deadline,
            resolved_at: r.resolved_at,
            resolution_comments: r.resolution_comments,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// List ordering.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// Store order
    #[default]
    Newest,
    /// Overdue first, then soonest deadline
    Deadline,
}

/// List query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub sort: SortOrder,
}

/// Report list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListResponse {
    pub reports: Vec<ReportResponse>,
    /// Earliest future deadline among the listed active reports
    pub next_recheck_at: Option<DateTime<Utc>>,
}

impl ReportListResponse {
    pub(super) fn build(mut reports: Vec<report::Model>, sort: SortOrder) -> Self {
        let now = Utc::now();
        if sort == SortOrder::Deadline {
            sort_by_deadline(&mut reports, now);
        }
        Self {
            next_recheck_at: next_recheck_at(&reports, now),
            reports: reports
                .into_iter()
                .map(|r| ReportResponse::at(r, now))
                .collect(),
        }
    }
}

/// Body of `toResolved`.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResolutionRequest {
    #[validate(length(max = 2000))]
    pub resolution_comments: Option<String>,
}

/// Eligible staff response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffResponse {
    pub id: String,
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub departments: Departments,
    pub active_reports: u64,
}

impl From<EligibleStaff> for StaffResponse {
    fn from(s: EligibleStaff) -> Self {
        Self {
            id: s.user.id,
            name: s.user.name,
            user_name: s.user.username,
            email: s.user.email,
            departments: s.user.departments,
            active_reports: s.active_reports,
        }
    }
}

fn single(report: report::Model) -> ApiResponse<ReportResponse> {
    ApiResponse::ok(ReportResponse::at(report, Utc::now()))
}

/// File a report.
async fn create_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateReportInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state.report_service.create(&user, req).await?;
    Ok(ApiResponse::created(ReportResponse::at(report, Utc::now())))
}

/// All reports.
async fn list_reports(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.report_service.list_all().await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// One report.
async fn get_report(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReportResponse>> {
    Ok(single(state.report_service.get(&id).await?))
}

/// Reports filed by the caller.
async fn my_reports(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.report_service.list_mine(&user).await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// Admin queue: reports nobody has been assigned.
async fn unassigned_reports(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.report_service.list_unassigned(&user).await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// Admin queue: reports the caller assigned.
async fn assigned_reports(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let reports = state.report_service.list_assigned_by(&user).await?;
    Ok(ApiResponse::ok(ReportListResponse::build(reports, query.sort)))
}

/// Staff who can take a report.
async fn eligible_staff(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<ApiResponse<Vec<StaffResponse>>> {
    let staff = state
        .assignment_service
        .eligible_staff(&user, &report_id)
        .await?;
    Ok(ApiResponse::ok(staff.into_iter().map(Into::into).collect()))
}

/// `OPEN -> IN_PROGRESS`.
async fn verify_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReportResponse>> {
    Ok(single(state.report_service.verify(&user, &id).await?))
}

/// Ask the creator to verify the fix.
async fn request_resolution(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReportResponse>> {
    Ok(single(state.resolution_service.request(&user, &id).await?))
}

/// Creator accepts the fix. The body is optional.
async fn accept_resolution(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<ApiResponse<ReportResponse>> {
    let req = if body.is_empty() {
        AcceptResolutionRequest::default()
    } else {
        serde_json::from_slice::<AcceptResolutionRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid body: {e}")))?
    };
    req.validate()?;

    Ok(single(
        state
            .resolution_service
            .accept(&user, &id, req.resolution_comments)
            .await?,
    ))
}

/// Creator rejects the fix.
async fn reject_resolution(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReportResponse>> {
    Ok(single(state.resolution_service.reject(&user, &id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports).post(create_report))
        .route("/user", get(my_reports))
        .route("/unAssigned", get(unassigned_reports))
        .route("/assignedReports", get(assigned_reports))
        .route("/getAllStaff/{report_id}", get(eligible_staff))
        .route("/verify/{id}", put(verify_report))
        .route("/resolve/{id}", put(request_resolution))
        .route("/toResolved/{id}", patch(accept_resolution))
        .route("/reject/{id}", patch(reject_resolution))
        .route("/{id}", get(get_report))
}
