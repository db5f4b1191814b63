use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::UserId).integer().null())
                    .col(ColumnDef::new(AuditLogs::EmployeeId).integer().null())
                    .col(ColumnDef::new(AuditLogs::Role).string_len(20).null())
                    .col(ColumnDef::new(AuditLogs::Action).string_len(255).not_null())
                    .col(ColumnDef::new(AuditLogs::Endpoint).string_len(500).not_null())
                    .col(ColumnDef::new(AuditLogs::Method).string_len(10).not_null())
                    .col(ColumnDef::new(AuditLogs::StatusCode).integer().not_null())
                    .col(ColumnDef::new(AuditLogs::IpAddress).string_len(64).null())
                    .col(ColumnDef::new(AuditLogs::UserAgent).text().null())
                    .col(ColumnDef::new(AuditLogs::RequestBody).text().null())
                    .col(ColumnDef::new(AuditLogs::ResponseBody).text().null())
                    .col(
                        ColumnDef::new(AuditLogs::DurationMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AuditLogs::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_audit_logs_user_id", AuditLogs::UserId),
            ("idx_audit_logs_created_at", AuditLogs::CreatedAt),
            ("idx_audit_logs_status_code", AuditLogs::StatusCode),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(AuditLogs::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(BugReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BugReports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BugReports::UserId).integer().null())
                    .col(ColumnDef::new(BugReports::Platform).string_len(20).not_null())
                    .col(ColumnDef::new(BugReports::Title).string_len(255).not_null())
                    .col(ColumnDef::new(BugReports::Description).text().not_null())
                    .col(ColumnDef::new(BugReports::ErrorType).string_len(100).null())
                    .col(ColumnDef::new(BugReports::StackTrace).text().null())
                    .col(ColumnDef::new(BugReports::DeviceInfo).text().null())
                    .col(ColumnDef::new(BugReports::AppVersion).string_len(50).null())
                    .col(ColumnDef::new(BugReports::OsVersion).string_len(50).null())
                    .col(
                        ColumnDef::new(BugReports::Status)
                            .string_len(20)
                            .not_null()
                            .default("open"),
                    )
                    .col(ColumnDef::new(BugReports::ResolvedBy).integer().null())
                    .col(
                        ColumnDef::new(BugReports::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(BugReports::Notes).text().null())
                    .col(
                        ColumnDef::new(BugReports::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BugReports::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bug_reports_status")
                    .table(BugReports::Table)
                    .col(BugReports::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BugReports::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    UserId,
    EmployeeId,
    Role,
    Action,
    Endpoint,
    Method,
    StatusCode,
    IpAddress,
    UserAgent,
    RequestBody,
    ResponseBody,
    DurationMs,
    ErrorMessage,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BugReports {
    Table,
    Id,
    UserId,
    Platform,
    Title,
    Description,
    ErrorType,
    StackTrace,
    DeviceInfo,
    AppVersion,
    OsVersion,
    Status,
    ResolvedBy,
    ResolvedAt,
    Notes,
    CreatedAt,
    UpdatedAt,
}
