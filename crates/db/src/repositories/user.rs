//! User repository.

use std::sync::Arc;

use async_trait::async_trait;
use janta_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entities::{User, UserRole, user};
use crate::store::UserStore;

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert(&self, model: user::Model) -> AppResult<user::Model> {
        user::ActiveModel::from(model)
            .reset_all()
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_role(&self, role: UserRole) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(user::Column::Role.eq(role))
            .order_by_asc(user::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{Department, Departments};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_user(id: &str, role: UserRole) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: format!("{id}_name"),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            role,
            departments: Departments(vec![Department::Drainage]),
            token: Some(format!("token_{id}")),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let user = create_test_user("u1", UserRole::Staff);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let found = repo.find_by_token("token_u1").await.unwrap().unwrap();

        assert_eq!(found.id, "u1");
        assert_eq!(found.role, UserRole::Staff);
    }

    #[tokio::test]
    async fn test_find_by_role_returns_admins() {
        let a1 = create_test_user("a1", UserRole::Admin);
        let a2 = create_test_user("a2", UserRole::Admin);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[a1, a2]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let admins = repo.find_by_role(UserRole::Admin).await.unwrap();

        assert_eq!(admins.len(), 2);
        assert!(admins.iter().all(|u| u.role == UserRole::Admin));
    }

    #[tokio::test]
    async fn test_find_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_summary_copies_identity() {
        let user = create_test_user("s1", UserRole::Staff);
        let summary = user.summary();
        assert_eq!(summary.id, "s1");
        assert_eq!(summary.user_name, "s1_name");
        assert_eq!(summary.email, "s1@example.com");
    }
}
