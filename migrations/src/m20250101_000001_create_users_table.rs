use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Users::Phone)
                            .string_len(50)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Users::Role).string_len(20).not_null())
                    .col(ColumnDef::new(Users::AdminLevel).integer().null())
                    .col(ColumnDef::new(Users::Address).text().null())
                    .col(ColumnDef::new(Users::Latitude).double().null())
                    .col(ColumnDef::new(Users::Longitude).double().null())
                    .col(ColumnDef::new(Users::LogoUrl).string_len(1024).null())
                    .col(ColumnDef::new(Users::BannerUrl).string_len(1024).null())
                    .col(ColumnDef::new(Users::Facebook).string_len(255).null())
                    .col(ColumnDef::new(Users::Instagram).string_len(255).null())
                    .col(ColumnDef::new(Users::Twitter).string_len(255).null())
                    .col(ColumnDef::new(Users::Linkedin).string_len(255).null())
                    .col(ColumnDef::new(Users::Youtube).string_len(255).null())
                    .col(ColumnDef::new(Users::Tiktok).string_len(255).null())
                    .col(ColumnDef::new(Users::Website).string_len(255).null())
                    .col(ColumnDef::new(Users::OpeningTime).string_len(5).null())
                    .col(ColumnDef::new(Users::ClosingTime).string_len(5).null())
                    .col(ColumnDef::new(Users::ClosedDaysOfWeek).string_len(20).null())
                    .col(
                        ColumnDef::new(Users::IsOpen)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::LastLogin)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_role")
                    .table(Users::Table)
                    .col(Users::Role)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_phone")
                    .table(Users::Table)
                    .col(Users::Phone)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Name,
    Phone,
    Role,
    AdminLevel,
    Address,
    Latitude,
    Longitude,
    LogoUrl,
    BannerUrl,
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
    Youtube,
    Tiktok,
    Website,
    OpeningTime,
    ClosingTime,
    ClosedDaysOfWeek,
    IsOpen,
    LastLogin,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
