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
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::SupplierId).integer().not_null())
                    .col(ColumnDef::new(Products::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(
                        ColumnDef::new(Products::Sku)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Products::Price)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::StockQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Products::Unit).string_len(20).null())
                    .col(ColumnDef::new(Products::Category).string_len(50).null())
                    .col(ColumnDef::new(Products::ImageUrl).string_len(1024).null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_products_supplier_id")
                            .from(Products::Table, Products::SupplierId)
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
                    .name("idx_products_supplier_id")
                    .table(Products::Table)
                    .col(Products::SupplierId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_products_deleted_at")
                    .table(Products::Table)
                    .col(Products::DeletedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductsStocksHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductsStocksHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductsStocksHistory::ProductId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductsStocksHistory::PreviousStock)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductsStocksHistory::NewStock)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductsStocksHistory::ChangeAmount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductsStocksHistory::ChangeType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductsStocksHistory::OrderId).integer().null())
                    .col(ColumnDef::new(ProductsStocksHistory::UserId).integer().null())
                    .col(
                        ColumnDef::new(ProductsStocksHistory::EmployeeId)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(ProductsStocksHistory::Notes).text().null())
                    .col(
                        ColumnDef::new(ProductsStocksHistory::CreatedAt)
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
                    .name("idx_stock_history_product_id")
                    .table(ProductsStocksHistory::Table)
                    .col(ProductsStocksHistory::ProductId)
                    .col(ProductsStocksHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_stock_history_change_type")
                    .table(ProductsStocksHistory::Table)
                    .col(ProductsStocksHistory::ChangeType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductsStocksHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Products {
    Table,
    Id,
    SupplierId,
    Name,
    Description,
    Sku,
    Price,
    StockQuantity,
    Unit,
    Category,
    ImageUrl,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum ProductsStocksHistory {
    Table,
    Id,
    ProductId,
    PreviousStock,
    NewStock,
    ChangeAmount,
    ChangeType,
    OrderId,
    UserId,
    EmployeeId,
    Notes,
    CreatedAt,
}
