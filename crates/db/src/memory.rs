//! In-memory storage.
//!
//! Implements the storage ports over `RwLock`ed maps with the same guard
//! semantics as the SQL repositories. Used by tests and for running the
//! service without `PostgreSQL`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janta_common::AppResult;
use tokio::sync::RwLock;

use crate::entities::{ReportStatus, UserRole, UserSummary, notification, report, user};
use crate::store::{NotificationStore, ReportStore, UserStore};

/// Bundle of in-memory stores sharing nothing but a lifetime.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Reports.
    pub reports: Arc<MemoryReportStore>,
    /// Users.
    pub users: Arc<MemoryUserStore>,
    /// Notifications.
    pub notifications: Arc<MemoryNotificationStore>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// In-memory [`ReportStore`], keyed by id.
#[derive(Default)]
pub struct MemoryReportStore {
    rows: RwLock<BTreeMap<String, report::Model>>,
}

impl MemoryReportStore {
    async fn select<F>(&self, newest_first: bool, pred: F) -> Vec<report::Model>
    where
        F: Fn(&report::Model) -> bool + Send,
    {
        let rows = self.rows.read().await;
        let mut out: Vec<_> = rows.values().filter(|r| pred(r)).cloned().collect();
        if newest_first {
            out.reverse();
        }
        out
    }

    /// Apply `change` only if `guard` holds. Check and write share one lock.
    async fn guarded<G, C>(&self, id: &str, guard: G, change: C) -> Option<report::Model>
    where
        G: FnOnce(&report::Model) -> bool + Send,
        C: FnOnce(&mut report::Model) + Send,
    {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id)?;
        if !guard(row) {
            return None;
        }
        change(row);
        Some(row.clone())
    }
}

fn awaiting_verification(r: &report::Model, creator_id: &str) -> bool {
    r.created_by == creator_id && r.status == ReportStatus::InProgress && r.is_notified_to_resolved
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(&self, model: report::Model) -> AppResult<report::Model> {
        self.rows
            .write()
            .await
            .insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<report::Model>> {
        Ok(self.select(true, |_| true).await)
    }

    async fn find_by_creator(&self, user_id: &str) -> AppResult<Vec<report::Model>> {
        Ok(self.select(true, |r| r.created_by == user_id).await)
    }

    async fn find_unassigned(&self) -> AppResult<Vec<report::Model>> {
        Ok(self.select(false, |r| !r.is_assigned).await)
    }

    async fn find_assigned_by(&self, admin_id: &str) -> AppResult<Vec<report::Model>> {
        Ok(self
            .select(true, |r| r.assigned_by_id.as_deref() == Some(admin_id))
            .await)
    }

    async fn find_assigned_to(&self, staff_id: &str) -> AppResult<Vec<report::Model>> {
        Ok(self
            .select(true, |r| r.assigned_to_id.as_deref() == Some(staff_id))
            .await)
    }

    async fn find_pending_verification(
        &self,
        creator_id: &str,
    ) -> AppResult<Vec<report::Model>> {
        Ok(self
            .select(true, |r| awaiting_verification(r, creator_id))
            .await)
    }

    async fn find_overdue_candidates(&self, now: DateTime<Utc>) -> AppResult<Vec<report::Model>> {
        let mut out = self
            .select(false, |r| {
                !r.is_overdue
                    && r.status != ReportStatus::Resolved
                    && r.deadline.is_some_and(|d| d < now)
            })
            .await;
        out.sort_by_key(|r| r.deadline);
        Ok(out)
    }

    async fn count_active_assigned_to(&self, staff_id: &str) -> AppResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|r| {
                r.assigned_to_id.as_deref() == Some(staff_id) && r.status != ReportStatus::Resolved
            })
            .count() as u64)
    }

    async fn mark_in_progress(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        Ok(self
            .guarded(
                id,
                |r| r.status == ReportStatus::Open,
                |r| {
                    r.status = ReportStatus::InProgress;
                    r.updated_at = Some(now);
                },
            )
            .await)
    }

    async fn mark_notified(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        Ok(self
            .guarded(
                id,
                |r| r.status == ReportStatus::InProgress,
                |r| {
                    r.is_notified_to_resolved = true;
                    r.updated_at = Some(now);
                },
            )
            .await)
    }

    async fn accept_resolution(
        &self,
        id: &str,
        creator_id: &str,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        Ok(self
            .guarded(
                id,
                |r| awaiting_verification(r, creator_id),
                |r| {
                    r.status = ReportStatus::Resolved;
                    r.resolved_at = Some(now);
                    r.resolution_comments = comments;
                    r.updated_at = Some(now);
                },
            )
            .await)
    }

    async fn reject_resolution(
        &self,
        id: &str,
        creator_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        Ok(self
            .guarded(
                id,
                |r| awaiting_verification(r, creator_id),
                |r| {
                    r.status = ReportStatus::Open;
                    r.is_notified_to_resolved = false;
                    r.updated_at = Some(now);
                },
            )
            .await)
    }

    async fn assign(
        &self,
        id: &str,
        staff: UserSummary,
        admin: UserSummary,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        Ok(self
            .guarded(
                id,
                |r| !r.is_assigned,
                |r| {
                    r.is_assigned = true;
                    r.assigned_to_id = Some(staff.id.clone());
                    r.assigned_to = Some(staff);
                    r.assigned_by_id = Some(admin.id.clone());
                    r.assigned_by = Some(admin);
                    r.updated_at = Some(now);
                },
            )
            .await)
    }

    async fn mark_overdue(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        Ok(self
            .guarded(
                id,
                |r| {
                    !r.is_overdue
                        && r.status != ReportStatus::Resolved
                        && r.deadline.is_some_and(|d| d < now)
                },
                |r| {
                    r.is_overdue = true;
                    r.updated_at = Some(now);
                },
            )
            .await)
    }
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<BTreeMap<String, user::Model>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, model: user::Model) -> AppResult<user::Model> {
        self.rows
            .write()
            .await
            .insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|u| u.token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_by_role(&self, role: UserRole) -> AppResult<Vec<user::Model>> {
        let mut out: Vec<_> = self
            .rows
            .read()
            .await
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

/// In-memory [`NotificationStore`].
#[derive(Default)]
pub struct MemoryNotificationStore {
    rows: RwLock<BTreeMap<String, notification::Model>>,
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, model: notification::Model) -> AppResult<notification::Model> {
        self.rows
            .write()
            .await
            .insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_for_user(&self, user_id: &str, id: &str) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        if rows.get(id).is_some_and(|n| n.user_id == user_id) {
            rows.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, n| n.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u64)
    }
}
