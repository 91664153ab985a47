//! Overdue sweep.
//!
//! Each run flags reports whose deadline has passed and escalates them to
//! the assigning admin, the assignee and every admin. The flag is set by a
//! guarded update, so each report is escalated once even when runs overlap
//! or several instances sweep the same database.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use janta_common::AppResult;
use janta_db::{
    ReportStoreRef, UserStoreRef,
    entities::{UserRole, report, user},
};
use serde::Serialize;

use crate::services::email::{MailerService, NoOpMailer, send_best_effort, templates};
use crate::services::event_publisher::StreamEvent;
use crate::services::notification::{NotificationService, overdue_message};

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Candidates returned by the scan.
    pub scanned: usize,
    /// Reports this run flagged.
    pub flagged: usize,
    /// Candidates another run flagged first.
    pub skipped: usize,
    /// Candidates whose escalation failed.
    pub failed: usize,
    /// Notification records written.
    pub notified: usize,
}

/// Users to notify for an overdue report, in delivery order and without
/// duplicates: the assigning admin, the assignee, then every admin.
#[must_use]
pub fn escalation_targets(report: &report::Model, admins: &[user::Model]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    let candidates = report
        .assigned_by_id
        .iter()
        .chain(report.assigned_to_id.iter())
        .chain(admins.iter().map(|a| &a.id));
    for id in candidates {
        if !targets.contains(id) {
            targets.push(id.clone());
        }
    }
    targets
}

/// Distinct mail addresses of the assignee and assigning admin.
#[must_use]
pub fn escalation_recipients(report: &report::Model) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for summary in [&report.assigned_to, &report.assigned_by].into_iter().flatten() {
        if !summary.email.is_empty() && !out.contains(&summary.email) {
            out.push(summary.email.clone());
        }
    }
    out
}

/// Overdue sweep service.
#[derive(Clone)]
pub struct OverdueService {
    reports: ReportStoreRef,
    users: UserStoreRef,
    notifications: NotificationService,
    mailer: MailerService,
}

impl OverdueService {
    /// Create a new overdue service.
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

    /// Run one sweep at `now`.
    ///
    /// Fails only if the candidate scan or the admin lookup fails. A failure
    /// while escalating one report is logged and the run moves on.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let candidates = self.reports.find_overdue_candidates(now).await?;
        let mut summary = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        if candidates.is_empty() {
            tracing::debug!("No overdue reports");
            return Ok(summary);
        }

        let admins = self.users.find_by_role(UserRole::Admin).await?;

        for report in &candidates {
            match self.escalate(report, &admins, now).await {
                Ok(Some(notified)) => {
                    summary.flagged += 1;
                    summary.notified += notified;
                }
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(report_id = %report.id, error = %e, "Failed to escalate overdue report");
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            flagged = summary.flagged,
            skipped = summary.skipped,
            failed = summary.failed,
            notified = summary.notified,
            "Overdue sweep completed"
        );
        Ok(summary)
    }

    /// Flag one report and fan out. `None` if it was already flagged.
    async fn escalate(
        &self,
        candidate: &report::Model,
        admins: &[user::Model],
        now: DateTime<Utc>,
    ) -> AppResult<Option<usize>> {
        let Some(report) = self.reports.mark_overdue(&candidate.id, now).await? else {
            return Ok(None);
        };

        let message = overdue_message(&report.id);
        let event = StreamEvent::overdue(&report);
        let mut notified = 0;
        for user_id in escalation_targets(&report, admins) {
            match self
                .notifications
                .deliver(&user_id, &report.id, message.clone(), event.clone())
                .await
            {
                Ok(_) => notified += 1,
                Err(e) => {
                    tracing::warn!(report_id = %report.id, user_id = %user_id, error = %e, "Failed to record overdue notification");
                }
            }
        }

        let (subject, body) = templates::overdue(&report.id, &report.title, report.deadline);
        for to in escalation_recipients(&report) {
            send_best_effort(self.mailer.as_ref(), &to, &subject, &body).await;
        }

        Ok(Some(notified))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::email::{Mailer, RecordingMailer};
    use crate::services::event_publisher::UserChannelHub;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use janta_common::AppError;
    use janta_db::entities::{ReportStatus, Severity, notification};
    use janta_db::memory::MemoryStore;
    use janta_db::test_utils::{report_fixture, user_fixture};
    use janta_db::{NotificationStore, NotificationStoreRef, ReportStore, UserStore};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        store: MemoryStore,
        service: OverdueService,
        hub: Arc<UserChannelHub>,
        mailer: Arc<RecordingMailer>,
    }

    async fn fixture_with(notifications: Option<NotificationStoreRef>) -> Fixture {
        let store = MemoryStore::new();
        for u in [
            user_fixture("admin1", UserRole::Admin, vec![]),
            user_fixture("admin2", UserRole::Admin, vec![]),
            user_fixture("staff", UserRole::Staff, vec![]),
            user_fixture("citizen", UserRole::Citizen, vec![]),
        ] {
            store.users.insert(u).await.unwrap();
        }

        let hub = Arc::new(UserChannelHub::new());
        let notification_store =
            notifications.unwrap_or_else(|| store.notifications.clone() as NotificationStoreRef);
        let mut notifications = NotificationService::new(notification_store);
        notifications.set_event_publisher(hub.clone());

        let mailer = Arc::new(RecordingMailer::default());
        let mut service =
            OverdueService::new(store.reports.clone(), store.users.clone(), notifications);
        service.set_mailer(mailer.clone());

        Fixture {
            store,
            service,
            hub,
            mailer,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(None).await
    }

    async fn assign(store: &MemoryStore, report_id: &str) {
        let users = &store.users;
        let staff = users.find_by_id("staff").await.unwrap().unwrap();
        let admin = users.find_by_id("admin1").await.unwrap().unwrap();
        store
            .reports
            .assign(report_id, staff.summary(), admin.summary(), t0())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_targets_are_ordered_and_deduplicated() {
        let mut report = report_fixture("r", "c", Severity::High, t0());
        let admins = vec![
            user_fixture("admin1", UserRole::Admin, vec![]),
            user_fixture("admin2", UserRole::Admin, vec![]),
        ];
        assert_eq!(escalation_targets(&report, &admins), vec!["admin1", "admin2"]);

        report.assigned_by_id = Some("admin2".to_string());
        report.assigned_to_id = Some("staff".to_string());
        assert_eq!(
            escalation_targets(&report, &admins),
            vec!["admin2", "staff", "admin1"]
        );
    }

    #[tokio::test]
    async fn test_unassigned_overdue_report_goes_to_admins() {
        let f = fixture().await;
        let report = report_fixture("r1", "citizen", Severity::High, t0());
        f.store.reports.insert(report).await.unwrap();
        let mut admin_session = f.hub.subscribe("admin1");

        let now = t0() + Duration::hours(24) + Duration::seconds(1);
        let summary = f.service.sweep_once(now).await.unwrap();

        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.notified, 2);
        let stored = f.store.reports.find_by_id("r1").await.unwrap().unwrap();
        assert!(stored.is_overdue);

        let list = f.store.notifications.find_by_user("admin1").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].message, "Report #r1 is now OVERDUE!");
        assert_eq!(admin_session.recv().await.unwrap().kind(), "reportOverdue");

        // No assignee or assigner, so nobody to mail.
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_assigned_overdue_report_notifies_each_target_once() {
        let f = fixture().await;
        f.store
            .reports
            .insert(report_fixture("r1", "citizen", Severity::Medium, t0()))
            .await
            .unwrap();
        assign(&f.store, "r1").await;

        let summary = f
            .service
            .sweep_once(t0() + Duration::hours(49))
            .await
            .unwrap();
        assert_eq!(summary.notified, 3);

        for user in ["admin1", "staff", "admin2"] {
            assert_eq!(
                f.store.notifications.count_unread(user).await.unwrap(),
                1,
                "{user}"
            );
        }
        assert_eq!(f.store.notifications.count_unread("citizen").await.unwrap(), 0);

        let mut to: Vec<_> = f.mailer.sent().into_iter().map(|m| m.to).collect();
        to.sort();
        assert_eq!(to, vec!["admin1@example.com", "staff@example.com"]);
        assert!(f.mailer.sent()[0].subject.starts_with("🚨 Overdue Report: "));
    }

    #[tokio::test]
    async fn test_report_is_flagged_once() {
        let f = fixture().await;
        f.store
            .reports
            .insert(report_fixture("r1", "citizen", Severity::High, t0()))
            .await
            .unwrap();
        let now = t0() + Duration::days(2);

        assert_eq!(f.service.sweep_once(now).await.unwrap().flagged, 1);
        let second = f.service.sweep_once(now + Duration::hours(1)).await.unwrap();
        assert_eq!(second, SweepReport::default());
        assert_eq!(f.store.notifications.count_unread("admin1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_flag_once() {
        let f = fixture().await;
        f.store
            .reports
            .insert(report_fixture("r1", "citizen", Severity::High, t0()))
            .await
            .unwrap();
        let now = t0() + Duration::days(2);

        let (a, b) = tokio::join!(f.service.sweep_once(now), f.service.sweep_once(now));
        let flagged = a.unwrap().flagged + b.unwrap().flagged;
        assert_eq!(flagged, 1);
        assert_eq!(f.store.notifications.count_unread("admin1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resolved_and_future_reports_are_ignored() {
        let f = fixture().await;
        let mut resolved = report_fixture("done", "citizen", Severity::High, t0());
        resolved.status = ReportStatus::Resolved;
        f.store.reports.insert(resolved).await.unwrap();
        f.store
            .reports
            .insert(report_fixture("fresh", "citizen", Severity::Low, t0()))
            .await
            .unwrap();
        let mut legacy = report_fixture("legacy", "citizen", Severity::Low, t0());
        legacy.deadline = None;
        f.store.reports.insert(legacy).await.unwrap();

        let summary = f
            .service
            .sweep_once(t0() + Duration::hours(30))
            .await
            .unwrap();
        assert_eq!(summary.scanned, 0);
    }

    #[tokio::test]
    async fn test_exact_deadline_is_not_overdue() {
        let f = fixture().await;
        f.store
            .reports
            .insert(report_fixture("r1", "citizen", Severity::High, t0()))
            .await
            .unwrap();

        let summary = f
            .service
            .sweep_once(t0() + Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(summary.flagged, 0);
    }

    /// Notification store that refuses writes for one user.
    struct RefusingStore {
        inner: NotificationStoreRef,
        refuse: &'static str,
    }

    #[async_trait]
    impl NotificationStore for RefusingStore {
        async fn insert(&self, model: notification::Model) -> AppResult<notification::Model> {
            if model.user_id == self.refuse {
                return Err(AppError::Database("connection reset".to_string()));
            }
            self.inner.insert(model).await
        }

        async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
            self.inner.find_by_user(user_id).await
        }

        async fn delete_for_user(&self, user_id: &str, id: &str) -> AppResult<bool> {
            self.inner.delete_for_user(user_id, id).await
        }

        async fn delete_all_for_user(&self, user_id: &str) -> AppResult<u64> {
            self.inner.delete_all_for_user(user_id).await
        }

        async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
            self.inner.count_unread(user_id).await
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send_mail(&self, _to: &str, _subject: &str, _body: &str) -> AppResult<()> {
            Err(AppError::ExternalService("smtp down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_one_failing_target_does_not_stop_the_rest() {
        let inner = Arc::new(janta_db::memory::MemoryNotificationStore::default());
        let refusing: NotificationStoreRef = Arc::new(RefusingStore {
            inner: inner.clone(),
            refuse: "admin1",
        });
        let mut f = fixture_with(Some(refusing)).await;
        f.service.set_mailer(Arc::new(FailingMailer));
        let mut admin1_session = f.hub.subscribe("admin1");

        for id in ["r1", "r2"] {
            f.store
                .reports
                .insert(report_fixture(id, "citizen", Severity::High, t0()))
                .await
                .unwrap();
        }
        assign(&f.store, "r1").await;

        let summary = f
            .service
            .sweep_once(t0() + Duration::days(2))
            .await
            .unwrap();

        assert_eq!(summary.flagged, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(inner.count_unread("staff").await.unwrap(), 1);
        assert_eq!(inner.count_unread("admin2").await.unwrap(), 2);
        assert_eq!(inner.count_unread("admin1").await.unwrap(), 0);

        // The live push still goes out when the record cannot be written.
        assert_eq!(admin1_session.recv().await.unwrap().kind(), "reportOverdue");
        for id in ["r1", "r2"] {
            let r = f.store.reports.find_by_id(id).await.unwrap().unwrap();
            assert!(r.is_overdue);
        }
    }
}
