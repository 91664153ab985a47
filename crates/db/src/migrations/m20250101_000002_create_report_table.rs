//! Create report table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Report::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Report::Title).string_len(512).not_null())
                    .col(ColumnDef::new(Report::Description).text())
                    .col(ColumnDef::new(Report::Severity).string_len(16).not_null())
                    .col(ColumnDef::new(Report::Departments).json_binary().not_null())
                    .col(ColumnDef::new(Report::LocationLng).double().not_null())
                    .col(ColumnDef::new(Report::LocationLat).double().not_null())
                    .col(
                        ColumnDef::new(Report::Status)
                            .string_len(16)
                            .not_null()
                            .default("OPEN"),
                    )
                    .col(ColumnDef::new(Report::ImageUrl).string_len(1024))
                    .col(
                        ColumnDef::new(Report::IsAssigned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Report::AssignedToId).string_len(32))
                    .col(ColumnDef::new(Report::AssignedTo).json_binary())
                    .col(ColumnDef::new(Report::AssignedById).string_len(32))
                    .col(ColumnDef::new(Report::AssignedBy).json_binary())
                    .col(
                        ColumnDef::new(Report::IsNotifiedToResolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Report::IsOverdue)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Report::Deadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::ResolutionComments).text())
                    .col(ColumnDef::new(Report::CreatedBy).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Report::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Report::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_created_by")
                            .from(Report::Table, Report::CreatedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_assigned_to")
                            .from(Report::Table, Report::AssignedToId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: created_by (citizen's own reports, pending verification)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_created_by")
                    .table(Report::Table)
                    .col(Report::CreatedBy)
                    .to_owned(),
            )
            .await?;

        // Index: assigned_to_id (staff workload)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_assigned_to_id")
                    .table(Report::Table)
                    .col(Report::AssignedToId)
                    .to_owned(),
            )
            .await?;

        // Index: (is_overdue, deadline) for the sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_report_overdue_deadline")
                    .table(Report::Table)
                    .col(Report::IsOverdue)
                    .col(Report::Deadline)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
    Title,
    Description,
    Severity,
    Departments,
    LocationLng,
    LocationLat,
    Status,
    ImageUrl,
    IsAssigned,
    AssignedToId,
    AssignedTo,
    AssignedById,
    AssignedBy,
    IsNotifiedToResolved,
    IsOverdue,
    Deadline,
    ResolvedAt,
    ResolutionComments,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
