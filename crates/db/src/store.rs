//! Storage ports.
//!
//! Services talk to these traits instead of the concrete repositories so
//! that the lifecycle rules can run against `PostgreSQL` or [`MemoryStore`].
//!
//! Every guarded write is a single conditional update: it returns the
//! updated row, or `None` when the guard no longer holds.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janta_common::AppResult;

use crate::entities::{UserRole, UserSummary, notification, report, user};

/// Report persistence.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a fully populated report.
    async fn insert(&self, model: report::Model) -> AppResult<report::Model>;

    /// Find a report by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>>;

    /// All reports, newest first.
    async fn find_all(&self) -> AppResult<Vec<report::Model>>;

    /// Reports filed by a user, newest first.
    async fn find_by_creator(&self, user_id: &str) -> AppResult<Vec<report::Model>>;

    /// Reports not yet bound to staff, oldest first.
    async fn find_unassigned(&self) -> AppResult<Vec<report::Model>>;

    /// Reports an admin assigned, newest first.
    async fn find_assigned_by(&self, admin_id: &str) -> AppResult<Vec<report::Model>>;

    /// Reports assigned to a staff member, newest first.
    async fn find_assigned_to(&self, staff_id: &str) -> AppResult<Vec<report::Model>>;

    /// A creator's reports waiting for them to accept or reject.
    async fn find_pending_verification(&self, creator_id: &str)
    -> AppResult<Vec<report::Model>>;

    /// Reports with `deadline < now`, not resolved and not yet flagged.
    async fn find_overdue_candidates(&self, now: DateTime<Utc>) -> AppResult<Vec<report::Model>>;

    /// Unresolved reports currently assigned to a staff member.
    async fn count_active_assigned_to(&self, staff_id: &str) -> AppResult<u64>;

    /// `OPEN -> IN_PROGRESS`.
    async fn mark_in_progress(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>>;

    /// Flag an `IN_PROGRESS` report as awaiting the creator's verification.
    async fn mark_notified(&self, id: &str, now: DateTime<Utc>)
    -> AppResult<Option<report::Model>>;

    /// Notified `IN_PROGRESS -> Resolved`, only for the creator.
    async fn accept_resolution(
        &self,
        id: &str,
        creator_id: &str,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>>;

    /// Notified `IN_PROGRESS -> OPEN`, only for the creator.
    async fn reject_resolution(
        &self,
        id: &str,
        creator_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>>;

    /// Bind an unassigned report to staff.
    async fn assign(
        &self,
        id: &str,
        staff: UserSummary,
        admin: UserSummary,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>>;

    /// Set `is_overdue` if the report is still past due, unresolved and unflagged.
    async fn mark_overdue(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<report::Model>>;
}

/// User lookups. Users are provisioned by the external auth service.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user.
    async fn insert(&self, model: user::Model) -> AppResult<user::Model>;

    /// Find a user by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>>;

    /// Find a user by bearer token.
    async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>>;

    /// All users with a role, ordered by name.
    async fn find_by_role(&self, role: UserRole) -> AppResult<Vec<user::Model>>;
}

/// Durable notification list.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Append a notification.
    async fn insert(&self, model: notification::Model) -> AppResult<notification::Model>;

    /// A user's notifications, newest first.
    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<notification::Model>>;

    /// Remove one of a user's notifications. Returns whether it existed.
    async fn delete_for_user(&self, user_id: &str, id: &str) -> AppResult<bool>;

    /// Remove all of a user's notifications.
    async fn delete_all_for_user(&self, user_id: &str) -> AppResult<u64>;

    /// Count unread notifications.
    async fn count_unread(&self, user_id: &str) -> AppResult<u64>;
}

/// Shared report store handle.
pub type ReportStoreRef = Arc<dyn ReportStore>;
/// Shared user store handle.
pub type UserStoreRef = Arc<dyn UserStore>;
/// Shared notification store handle.
pub type NotificationStoreRef = Arc<dyn NotificationStore>;
