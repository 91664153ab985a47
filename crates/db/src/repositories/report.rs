//! Report repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janta_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, UpdateMany, sea_query::Expr,
};

use crate::entities::{Report, ReportStatus, UserSummary, report};
use crate::store::ReportStore;

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn list(
        &self,
        query: sea_orm::Select<Report>,
    ) -> AppResult<Vec<report::Model>> {
        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Run a conditional update and return the row it touched, if any.
    async fn guarded(&self, update: UpdateMany<Report>) -> AppResult<Option<report::Model>> {
        let mut rows = update
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.pop())
    }

    fn awaiting_verification(id: &str, creator_id: &str) -> UpdateMany<Report> {
        Report::update_many()
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::CreatedBy.eq(creator_id))
            .filter(report::Column::Status.eq(ReportStatus::InProgress))
            .filter(report::Column::IsNotifiedToResolved.eq(true))
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn insert(&self, model: report::Model) -> AppResult<report::Model> {
        report::ActiveModel::from(model)
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_all(&self) -> AppResult<Vec<report::Model>> {
        self.list(Report::find().order_by_desc(report::Column::Id))
            .await
    }

    async fn find_by_creator(&self, user_id: &str) -> AppResult<Vec<report::Model>> {
        self.list(
            Report::find()
                .filter(report::Column::CreatedBy.eq(user_id))
                .order_by_desc(report::Column::Id),
        )
        .await
    }

    async fn find_unassigned(&self) -> AppResult<Vec<report::Model>> {
        self.list(
            Report::find()
                .filter(report::Column::IsAssigned.eq(false))
                .order_by_asc(report::Column::Id),
        )
        .await
    }

    async fn find_assigned_by(&self, admin_id: &str) -> AppResult<Vec<report::Model>> {
        self.list(
            Report::find()
                .filter(report::Column::AssignedById.eq(admin_id))
                .order_by_desc(report::Column::Id),
        )
        .await
    }

    async fn find_assigned_to(&self, staff_id: &str) -> AppResult<Vec<report::Model>> {
        self.list(
            Report::find()
                .filter(report::Column::AssignedToId.eq(staff_id))
                .order_by_desc(report::Column::Id),
        )
        .await
    }

    async fn find_pending_verification(
        &self,
        creator_id: &str,
    ) -> AppResult<Vec<report::Model>> {
        self.list(
            Report::find()
                .filter(report::Column::CreatedBy.eq(creator_id))
                .filter(report::Column::Status.eq(ReportStatus::InProgress))
                .filter(report::Column::IsNotifiedToResolved.eq(true))
                .order_by_desc(report::Column::Id),
        )
        .await
    }

    async fn find_overdue_candidates(&self, now: DateTime<Utc>) -> AppResult<Vec<report::Model>> {
        self.list(
            Report::find()
                .filter(report::Column::Deadline.lt(now))
                .filter(report::Column::Status.ne(ReportStatus::Resolved))
                .filter(report::Column::IsOverdue.eq(false))
                .order_by_asc(report::Column::Deadline),
        )
        .await
    }

    async fn count_active_assigned_to(&self, staff_id: &str) -> AppResult<u64> {
        Report::find()
            .filter(report::Column::AssignedToId.eq(staff_id))
            .filter(report::Column::Status.ne(ReportStatus::Resolved))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn mark_in_progress(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        self.guarded(
            Report::update_many()
                .col_expr(report::Column::Status, Expr::value(ReportStatus::InProgress))
                .col_expr(report::Column::UpdatedAt, Expr::value(now))
                .filter(report::Column::Id.eq(id))
                .filter(report::Column::Status.eq(ReportStatus::Open)),
        )
        .await
    }

    async fn mark_notified(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        self.guarded(
            Report::update_many()
                .col_expr(report::Column::IsNotifiedToResolved, Expr::value(true))
                .col_expr(report::Column::UpdatedAt, Expr::value(now))
                .filter(report::Column::Id.eq(id))
                .filter(report::Column::Status.eq(ReportStatus::InProgress)),
        )
        .await
    }

    async fn accept_resolution(
        &self,
        id: &str,
        creator_id: &str,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        self.guarded(
            Self::awaiting_verification(id, creator_id)
                .col_expr(report::Column::Status, Expr::value(ReportStatus::Resolved))
                .col_expr(report::Column::ResolvedAt, Expr::value(now))
                .col_expr(report::Column::ResolutionComments, Expr::value(comments))
                .col_expr(report::Column::UpdatedAt, Expr::value(now)),
        )
        .await
    }

    async fn reject_resolution(
        &self,
        id: &str,
        creator_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        self.guarded(
            Self::awaiting_verification(id, creator_id)
                .col_expr(report::Column::Status, Expr::value(ReportStatus::Open))
                .col_expr(report::Column::IsNotifiedToResolved, Expr::value(false))
                .col_expr(report::Column::UpdatedAt, Expr::value(now)),
        )
        .await
    }

    async fn assign(
        &self,
        id: &str,
        staff: UserSummary,
        admin: UserSummary,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        self.guarded(
            Report::update_many()
                .col_expr(report::Column::IsAssigned, Expr::value(true))
                .col_expr(report::Column::AssignedToId, Expr::value(staff.id.clone()))
                .col_expr(report::Column::AssignedTo, Expr::value(staff))
                .col_expr(report::Column::AssignedById, Expr::value(admin.id.clone()))
                .col_expr(report::Column::AssignedBy, Expr::value(admin))
                .col_expr(report::Column::UpdatedAt, Expr::value(now))
                .filter(report::Column::Id.eq(id))
                .filter(report::Column::IsAssigned.eq(false)),
        )
        .await
    }

    async fn mark_overdue(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<report::Model>> {
        self.guarded(
            Report::update_many()
                .col_expr(report::Column::IsOverdue, Expr::value(true))
                .col_expr(report::Column::UpdatedAt, Expr::value(now))
                .filter(report::Column::Id.eq(id))
                .filter(report::Column::IsOverdue.eq(false))
                .filter(report::Column::Status.ne(ReportStatus::Resolved))
                .filter(report::Column::Deadline.lt(now)),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{Department, Departments, Severity};
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_report(id: &str, status: ReportStatus) -> report::Model {
        let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        report::Model {
            id: id.to_string(),
            title: "Burst water main".to_string(),
            description: None,
            severity: Severity::High,
            departments: Departments(vec![Department::WaterSupplySewage]),
            location_lng: 77.2,
            location_lat: 28.6,
            status,
            image_url: None,
            is_assigned: false,
            assigned_to_id: None,
            assigned_to: None,
            assigned_by_id: None,
            assigned_by: None,
            is_notified_to_resolved: false,
            is_overdue: false,
            deadline: Some(created_at + Duration::hours(24)),
            resolved_at: None,
            resolution_comments: None,
            created_by: "citizen1".to_string(),
            created_at,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id_returns_report() {
        let report = create_test_report("r1", ReportStatus::Open);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let found = repo.find_by_id("r1").await.unwrap().unwrap();

        assert_eq!(found.id, "r1");
        assert_eq!(found.departments.0, vec![Department::WaterSupplySewage]);
    }

    #[tokio::test]
    async fn test_mark_in_progress_returns_updated_row() {
        let mut updated = create_test_report("r1", ReportStatus::InProgress);
        updated.updated_at = Some(Utc::now());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[updated]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo.mark_in_progress("r1", Utc::now()).await.unwrap();

        assert_eq!(result.unwrap().status, ReportStatus::InProgress);
    }

    #[tokio::test]
    async fn test_guard_miss_returns_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<report::Model>::new()])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo
            .accept_resolution("r1", "someone-else", None, Utc::now())
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mark_overdue_returns_flagged_row() {
        let mut flagged = create_test_report("r1", ReportStatus::Open);
        flagged.is_overdue = true;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[flagged]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo.mark_overdue("r1", Utc::now()).await.unwrap();

        assert!(result.unwrap().is_overdue);
    }

    #[tokio::test]
    async fn test_count_active_assigned_to() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3))
                }]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        assert_eq!(repo.count_active_assigned_to("staff1").await.unwrap(), 3);
    }
}
