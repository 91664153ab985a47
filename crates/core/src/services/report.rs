//! Report service: creation, queries and the `OPEN -> IN_PROGRESS` step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use janta_common::{AppError, AppResult, IdGenerator};
use janta_db::{
    ReportStoreRef, UserStoreRef,
    entities::{Department, Departments, ReportStatus, Severity, UserRole, report, user},
};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::services::deadline::deadline_for;
use crate::services::email::{MailerService, NoOpMailer, send_best_effort, templates};

/// Message returned when a citizen tries a staff transition.
pub const STATUS_CHANGE_FORBIDDEN: &str = "You are not allowed to change the report status.";

/// A `GeoJSON` point.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_point"))]
pub struct GeoPoint {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

fn validate_point(point: &GeoPoint) -> Result<(), ValidationError> {
    if point.kind != "Point" {
        return Err(ValidationError::new("location_type"));
    }
    let [lng, lat] = point.coordinates;
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::new("location_range"));
    }
    Ok(())
}

/// Input for filing a report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportInput {
    #[validate(length(min = 1, max = 512))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    pub severity: Severity,

    #[validate(length(min = 1))]
    pub departments: Vec<Department>,

    #[validate(nested)]
    pub location: GeoPoint,

    /// URL of an image already uploaded to external storage.
    #[validate(url)]
    pub image_url: Option<String>,
}

pub(crate) fn ensure_not_citizen(actor: &user::Model) -> AppResult<()> {
    if actor.role == UserRole::Citizen {
        return Err(AppError::Forbidden(STATUS_CHANGE_FORBIDDEN.to_string()));
    }
    Ok(())
}

pub(crate) fn ensure_admin(actor: &user::Model) -> AppResult<()> {
    if actor.role != UserRole::Admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

pub(crate) async fn load_report(
    reports: &ReportStoreRef,
    report_id: &str,
) -> AppResult<report::Model> {
    reports
        .find_by_id(report_id)
        .await?
        .ok_or_else(|| AppError::ReportNotFound(report_id.to_string()))
}

/// Report service for business logic.
#[derive(Clone)]
pub struct ReportService {
    reports: ReportStoreRef,
    users: UserStoreRef,
    mailer: MailerService,
    id_gen: IdGenerator,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub fn new(reports: ReportStoreRef, users: UserStoreRef) -> Self {
        Self {
            reports,
            users,
            mailer: Arc::new(NoOpMailer),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the mailer.
    pub fn set_mailer(&mut self, mailer: MailerService) {
        self.mailer = mailer;
    }

    /// File a report. The deadline is derived from severity and written in
    /// the same insert. Every admin is mailed afterwards.
    pub async fn create(
        &self,
        actor: &user::Model,
        input: CreateReportInput,
    ) -> AppResult<report::Model> {
        self.create_at(actor, input, Utc::now()).await
    }

    /// [`create`](Self::create) with an explicit creation time.
    pub async fn create_at(
        &self,
        actor: &user::Model,
        input: CreateReportInput,
        created_at: DateTime<Utc>,
    ) -> AppResult<report::Model> {
        input.validate()?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("Report title is required".to_string()));
        }

        let [location_lng, location_lat] = input.location.coordinates;
        let model = report::Model {
            id: self.id_gen.generate(),
            title: title.to_string(),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            severity: input.severity,
            departments: Departments(input.departments).normalized(),
            location_lng,
            location_lat,
            status: ReportStatus::Open,
            image_url: input.image_url,
            is_assigned: false,
            assigned_to_id: None,
            assigned_to: None,
            assigned_by_id: None,
            assigned_by: None,
            is_notified_to_resolved: false,
            is_overdue: false,
            deadline: Some(deadline_for(input.severity, created_at)),
            resolved_at: None,
            resolution_comments: None,
            created_by: actor.id.clone(),
            created_at,
            updated_at: None,
        };

        let report = self.reports.insert(model).await?;
        tracing::info!(report_id = %report.id, severity = ?report.severity, "Report created");

        self.notify_admins_of_new_report(&report).await;
        Ok(report)
    }

    async fn notify_admins_of_new_report(&self, report: &report::Model) {
        let admins = match self.users.find_by_role(UserRole::Admin).await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!(report_id = %report.id, error = %e, "Failed to load admins");
                return;
            }
        };

        let (subject, body) = templates::new_report(&report.title);
        for admin in admins {
            send_best_effort(self.mailer.as_ref(), &admin.email, &subject, &body).await;
        }
    }

    /// Get a report by ID.
    pub async fn get(&self, report_id: &str) -> AppResult<report::Model> {
        load_report(&self.reports, report_id).await
    }

    /// All reports.
    pub async fn list_all(&self) -> AppResult<Vec<report::Model>> {
        self.reports.find_all().await
    }

    /// Reports filed by the actor.
    pub async fn list_mine(&self, actor: &user::Model) -> AppResult<Vec<report::Model>> {
        self.reports.find_by_creator(&actor.id).await
    }

    /// Reports waiting for an admin to assign them.
    pub async fn list_unassigned(&self, actor: &user::Model) -> AppResult<Vec<report::Model>> {
        ensure_admin(actor)?;
        self.reports.find_unassigned().await
    }

    /// Reports the acting admin assigned.
    pub async fn list_assigned_by(&self, actor: &user::Model) -> AppResult<Vec<report::Model>> {
        ensure_admin(actor)?;
        self.reports.find_assigned_by(&actor.id).await
    }

    /// Reports assigned to the acting staff member.
    pub async fn list_assigned_to(&self, actor: &user::Model) -> AppResult<Vec<report::Model>> {
        if actor.role != UserRole::Staff {
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }
        self.reports.find_assigned_to(&actor.id).await
    }

    /// Reports in any of the actor's departments.
    pub async fn list_departmental(&self, actor: &user::Model) -> AppResult<Vec<report::Model>> {
        if actor.role == UserRole::Citizen {
            return Err(AppError::Forbidden(
                "Citizens do not belong to a department".to_string(),
            ));
        }
        let all = self.reports.find_all().await?;
        Ok(all
            .into_iter()
            .filter(|r| r.departments.overlaps(&actor.departments))
            .collect())
    }

    /// `OPEN -> IN_PROGRESS`. Staff and admins only.
    pub async fn verify(&self, actor: &user::Model, report_id: &str) -> AppResult<report::Model> {
        ensure_not_citizen(actor)?;

        let report = load_report(&self.reports, report_id).await?;
        if report.status != ReportStatus::Open {
            return Err(AppError::InvalidState(format!(
                "Report must be OPEN to be verified, but is {:?}",
                report.status
            )));
        }

        let updated = self
            .reports
            .mark_in_progress(report_id, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::InvalidState("Report status changed concurrently".to_string())
            })?;

        tracing::info!(report_id = %report_id, actor_id = %actor.id, "Report marked in progress");
        Ok(updated)
    }
}
