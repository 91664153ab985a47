//! Report entity.

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::department::Departments;

/// Report severity. Determines the resolution deadline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Severity {
    #[sea_orm(string_value = "Low")]
    Low,
    #[sea_orm(string_value = "Medium")]
    Medium,
    #[sea_orm(string_value = "High")]
    High,
}

/// Report status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ReportStatus {
    #[sea_orm(string_value = "OPEN")]
    #[serde(rename = "OPEN")]
    Open,
    #[sea_orm(string_value = "IN_PROGRESS")]
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "Resolved")]
    #[serde(rename = "Resolved")]
    Resolved,
}

impl ReportStatus {
    /// Open or in progress.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

/// Snapshot of a user copied onto a report at assignment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub user_name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Fixed at creation
    pub severity: Severity,

    #[sea_orm(column_type = "JsonBinary")]
    pub departments: Departments,

    pub location_lng: f64,

    pub location_lat: f64,

    pub status: ReportStatus,

    #[sea_orm(nullable)]
    pub image_url: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_assigned: bool,

    #[sea_orm(nullable)]
    pub assigned_to_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub assigned_to: Option<UserSummary>,

    #[sea_orm(nullable)]
    pub assigned_by_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub assigned_by: Option<UserSummary>,

    /// Staff asked the creator to verify the resolution
    #[sea_orm(default_value = false)]
    pub is_notified_to_resolved: bool,

    /// Set once by the overdue sweep, never cleared
    #[sea_orm(default_value = false)]
    pub is_overdue: bool,

    /// NULL only on rows predating deadline derivation
    #[sea_orm(nullable)]
    pub deadline: Option<DateTime<Utc>>,

    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTime<Utc>>,

    #[sea_orm(column_type = "Text", nullable)]
    pub resolution_comments: Option<String>,

    pub created_by: String,

    pub created_at: DateTime<Utc>,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
