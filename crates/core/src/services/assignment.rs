//! Binding reports to staff.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use janta_common::{AppError, AppResult};
use janta_db::{
    ReportStoreRef, UserStoreRef,
    entities::{UserRole, report, user},
};
use serde::Serialize;

use crate::services::email::{MailerService, NoOpMailer, send_best_effort, templates};
use crate::services::event_publisher::StreamEvent;
use crate::services::notification::NotificationService;
use crate::services::report::{ensure_admin, load_report};

/// A staff member who can take a report, with their open workload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleStaff {
    #[serde(flatten)]
    pub user: user::Model,
    pub active_reports: u64,
}

/// Assignment service for business logic.
#[derive(Clone)]
pub struct AssignmentService {
    reports: ReportStoreRef,
    users: UserStoreRef,
    notifications: NotificationService,
    mailer: MailerService,
}

impl AssignmentService {
    /// Create a new assignment service.
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

    /// Assign a report to a staff member. A report is assigned at most once.
    pub async fn assign(
        &self,
        admin: &user::Model,
        report_id: &str,
        staff_id: &str,
    ) -> AppResult<report::Model> {
        ensure_admin(admin)?;

        let report = load_report(&self.reports, report_id).await?;
        if report.is_assigned {
            return Err(AppError::Conflict("Report is already assigned".to_string()));
        }

        let staff = self
            .users
            .find_by_id(staff_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(staff_id.to_string()))?;
        if staff.role != UserRole::Staff {
            return Err(AppError::BadRequest(
                "Reports can only be assigned to staff".to_string(),
            ));
        }

        let updated = self
            .reports
            .assign(report_id, staff.summary(), admin.summary(), Utc::now())
            .await?
            .ok_or_else(|| AppError::Conflict("Report is already assigned".to_string()))?;

        tracing::info!(
            report_id = %report_id,
            staff_id = %staff_id,
            admin_id = %admin.id,
            "Report assigned"
        );

        let event = StreamEvent::ReportAssigned {
            id: updated.id.clone(),
            title: updated.title.clone(),
            severity: updated.severity,
            deadline: updated.deadline,
            assigned_by: admin.name.clone(),
        };
        let message = format!("You have been assigned \"{}\"", updated.title);
        if let Err(e) = self
            .notifications
            .deliver(&staff.id, &updated.id, message, event)
            .await
        {
            tracing::warn!(report_id = %report_id, staff_id = %staff_id, error = %e, "Failed to record notification");
        }

        let (subject, body) = templates::assigned(&updated.title, &admin.name, updated.deadline);
        send_best_effort(self.mailer.as_ref(), &staff.email, &subject, &body).await;

        Ok(updated)
    }

    /// Staff whose departments overlap the report's, least loaded first.
    pub async fn eligible_staff(
        &self,
        admin: &user::Model,
        report_id: &str,
    ) -> AppResult<Vec<EligibleStaff>> {
        ensure_admin(admin)?;

        let report = load_report(&self.reports, report_id).await?;
        let candidates: Vec<_> = self
            .users
            .find_by_role(UserRole::Staff)
            .await?
            .into_iter()
            .filter(|u| u.departments.overlaps(&report.departments))
            .collect();

        let loads = try_join_all(
            candidates
                .iter()
                .map(|u| self.reports.count_active_assigned_to(&u.id)),
        )
        .await?;

        let mut staff: Vec<_> = candidates
            .into_iter()
            .zip(loads)
            .map(|(user, active_reports)| EligibleStaff {
                user,
                active_reports,
            })
            .collect();
        staff.sort_by(|a, b| {
            a.active_reports
                .cmp(&b.active_reports)
                .then_with(|| a.user.name.cmp(&b.user.name))
        });
        Ok(staff)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::email::RecordingMailer;
    use crate::services::event_publisher::UserChannelHub;
    use janta_db::entities::{Department, Severity};
    use janta_db::memory::MemoryStore;
    use janta_db::test_utils::{report_fixture, user_fixture};
    use janta_db::{NotificationStore, ReportStore, UserStore};

    struct Fixture {
        store: MemoryStore,
        service: AssignmentService,
        hub: Arc<UserChannelHub>,
        mailer: Arc<RecordingMailer>,
        admin: user::Model,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let users = [
            user_fixture("admin", UserRole::Admin, vec![]),
            user_fixture("s1", UserRole::Staff, vec![Department::RoadsInfrastructure]),
            user_fixture("s2", UserRole::Staff, vec![Department::RoadsInfrastructure]),
            user_fixture("s3", UserRole::Staff, vec![Department::Revenue]),
            user_fixture("citizen", UserRole::Citizen, vec![]),
        ];
        for u in &users {
            store.users.insert(u.clone()).await.unwrap();
        }
        for id in ["r1", "r2"] {
            store
                .reports
                .insert(report_fixture(id, "citizen", Severity::High, Utc::now()))
                .await
                .unwrap();
        }

        let hub = Arc::new(UserChannelHub::new());
        let mut notifications = NotificationService::new(store.notifications.clone());
        notifications.set_event_publisher(hub.clone());
        let mailer = Arc::new(RecordingMailer::default());
        let mut service =
            AssignmentService::new(store.reports.clone(), store.users.clone(), notifications);
        service.set_mailer(mailer.clone());

        Fixture {
            store,
            service,
            hub,
            mailer,
            admin: users[0].clone(),
        }
    }

    #[tokio::test]
    async fn test_assign_notifies_staff() {
        let f = fixture().await;
        let mut session = f.hub.subscribe("s1");

        let report = f.service.assign(&f.admin, "r1", "s1").await.unwrap();
        assert!(report.is_assigned);
        assert_eq!(report.assigned_to_id.as_deref(), Some("s1"));
        assert_eq!(report.assigned_by_id.as_deref(), Some("admin"));
        assert_eq!(report.assigned_to.unwrap().email, "s1@example.com");

        let event = session.recv().await.unwrap();
        assert_eq!(event.kind(), "reportAssigned");
        assert_eq!(f.store.notifications.count_unread("s1").await.unwrap(), 1);
        assert_eq!(f.mailer.sent()[0].to, "s1@example.com");
    }

    #[tokio::test]
    async fn test_assign_is_exactly_once() {
        let f = fixture().await;
        f.service.assign(&f.admin, "r1", "s1").await.unwrap();

        let err = f.service.assign(&f.admin, "r1", "s2").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let report = f.store.reports.find_by_id("r1").await.unwrap().unwrap();
        assert_eq!(report.assigned_to_id.as_deref(), Some("s1"));
        assert_eq!(f.store.notifications.count_unread("s2").await.unwrap(), 0);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_assign_rejects_non_staff_and_non_admin() {
        let f = fixture().await;
        let err = f.service.assign(&f.admin, "r1", "citizen").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = f.service.assign(&f.admin, "r1", "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound(_)));

        let staff = user_fixture("s1", UserRole::Staff, vec![]);
        let err = f.service.assign(&staff, "r1", "s2").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let report = f.store.reports.find_by_id("r1").await.unwrap().unwrap();
        assert!(!report.is_assigned);
    }

    #[tokio::test]
    async fn test_eligible_staff_by_department_and_load() {
        let f = fixture().await;
        f.service.assign(&f.admin, "r2", "s1").await.unwrap();

        let staff = f.service.eligible_staff(&f.admin, "r1").await.unwrap();
        let ids: Vec<_> = staff.iter().map(|s| s.user.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
        assert_eq!(staff[1].active_reports, 1);
    }
}
