use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduleExceptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduleExceptions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduleExceptions::UserId).integer().not_null())
                    .col(ColumnDef::new(ScheduleExceptions::Date).date().not_null())
                    .col(
                        ColumnDef::new(ScheduleExceptions::IsClosed)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ScheduleExceptions::OpeningTime)
                            .string_len(5)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleExceptions::ClosingTime)
                            .string_len(5)
                            .null(),
                    )
                    .col(ColumnDef::new(ScheduleExceptions::Notes).text().null())
                    .col(
                        ColumnDef::new(ScheduleExceptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleExceptions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedule_exceptions_user_id")
                            .from(ScheduleExceptions::Table, ScheduleExceptions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_schedule_exceptions_user_date")
                    .table(ScheduleExceptions::Table)
                    .col(ScheduleExceptions::UserId)
                    .col(ScheduleExceptions::Date)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduleExceptions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduleExceptions {
    Table,
    Id,
    UserId,
    Date,
    IsClosed,
    OpeningTime,
    ClosingTime,
    Notes,
    CreatedAt,
    UpdatedAt,
}
