//! Resolution handshake.
//!
//! Staff ask the creator to confirm a fix; the creator then accepts
//! (`IN_PROGRESS -> Resolved`) or rejects (`IN_PROGRESS -> OPEN`). Only
//! the creator may answer, and only while the request is pending.

use std::sync::Arc;

use chrono::Utc;
use janta_common::{AppError, AppResult};
use janta_db::{
    ReportStoreRef, UserStoreRef,
    entities::{ReportStatus, report, user},
};

use crate::services::email::{MailerService, NoOpMailer, send_best_effort, templates};
use crate::services::event_publisher::StreamEvent;
use crate::services::notification::NotificationService;
use crate::services::report::{ensure_not_citizen, load_report};

/// Resolution service for business logic.
#[derive(Clone)]
pub struct ResolutionService {
    reports: ReportStoreRef,
    users: UserStoreRef,
    notifications: NotificationService,
    mailer: MailerService,
}

impl ResolutionService {
    /// Create a new resolution service.
    #[must_use]
    pub fn new(
        reports: ReportStoreRef,
        users: UserStoreRef,
        notifications: NotificationService,
    ) -> Self {
        Self {
            reports,
            users,
            notifications,
            mailer: Arc::new(NoOpMailer),
        }
    }

    /// Set the mailer.
    pub fn set_mailer(&mut self, mailer: MailerService) {
        self.mailer = mailer;
    }

    /// Ask the creator to verify a fix. Repeating the request re-sends the mail.
    pub async fn request(&self, actor: &user::Model, report_id: &str) -> AppResult<report::Model> {
        ensure_not_citizen(actor)?;

        let report = load_report(&self.reports, report_id).await?;
        if report.status != ReportStatus::InProgress {
            return Err(AppError::InvalidState(
                "Report must be in 'IN_PROGRESS' status to be resolved.".to_string(),
            ));
        }

        let updated = self
            .reports
            .mark_notified(report_id, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::InvalidState("Report status changed concurrently".to_string())
            })?;

        tracing::info!(report_id = %report_id, actor_id = %actor.id, "Resolution requested");

        match self.users.find_by_id(&updated.created_by).await {
            Ok(Some(creator)) => {
                let (subject, body) = templates::resolution_requested(&updated.title);
                send_best_effort(self.mailer.as_ref(), &creator.email, &subject, &body).await;
            }
            Ok(None) => {
                tracing::warn!(report_id = %report_id, "Report creator no longer exists");
            }
            Err(e) => {
                tracing::warn!(report_id = %report_id, error = %e, "Failed to load report creator");
            }
        }

        Ok(updated)
    }

    /// Accept the fix. Closes the report.
    pub async fn accept(
        &self,
        actor: &user::Model,
        report_id: &str,
        comments: Option<String>,
    ) -> AppResult<report::Model> {
        self.check_pending(actor, report_id).await?;

        let comments = comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let updated = self
            .reports
            .accept_resolution(report_id, &actor.id, comments, Utc::now())
            .await?
            .ok_or_else(already_answered)?;

        tracing::info!(report_id = %report_id, "Resolution accepted");
        self.notify_outcome(&updated, true).await;
        Ok(updated)
    }

    /// Reject the fix. Reopens the report.
    pub async fn reject(&self, actor: &user::Model, report_id: &str) -> AppResult<report::Model> {
        self.check_pending(actor, report_id).await?;

        let updated = self
            .reports
            .reject_resolution(report_id, &actor.id, Utc::now())
            .await?
            .ok_or_else(already_answered)?;

        tracing::info!(report_id = %report_id, "Resolution rejected");
        self.notify_outcome(&updated, false).await;
        Ok(updated)
    }

    /// Reports waiting for the user's answer.
    pub async fn pending_for(&self, actor: &user::Model) -> AppResult<Vec<report::Model>> {
        self.reports.find_pending_verification(&actor.id).await
    }

    async fn check_pending(&self, actor: &user::Model, report_id: &str) -> AppResult<()> {
        let report = load_report(&self.reports, report_id).await?;
        if report.created_by != actor.id {
            return Err(AppError::Forbidden(
                "Only the report creator can verify its resolution".to_string(),
            ));
        }
        if report.status != ReportStatus::InProgress || !report.is_notified_to_resolved {
            return Err(AppError::InvalidState(
                "Report is not awaiting verification".to_string(),
            ));
        }
        Ok(())
    }

    async fn notify_outcome(&self, report: &report::Model, accepted: bool) {
        let Some(ref staff) = report.assigned_to else {
            return;
        };

        let (message, event) = if accepted {
            (
                format!("Resolution of \"{}\" was accepted", report.title),
                StreamEvent::ResolutionAccepted {
                    id: report.id.clone(),
                    title: report.title.clone(),
                },
            )
        } else {
            (
                format!("Resolution of \"{}\" was rejected", report.title),
                StreamEvent::ResolutionRejected {
                    id: report.id.clone(),
                    title: report.title.clone(),
                },
            )
        };

        if let Err(e) = self
            .notifications
            .deliver(&staff.id, &report.id, message, event)
            .await
        {
            tracing::warn!(report_id = %report.id, staff_id = %staff.id, error = %e, "Failed to record notification");
        }

        let (subject, body) = templates::verification_outcome(&report.title, accepted);
        send_best_effort(self.mailer.as_ref(), &staff.email, &subject, &body).await;
    }
}

fn already_answered() -> AppError {
    AppError::InvalidState("Report is not awaiting verification".to_string())
}
