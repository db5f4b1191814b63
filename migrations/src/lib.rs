pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users_table;
mod m20250101_000002_create_products_tables;
mod m20250101_000003_create_orders_tables;
mod m20250101_000004_create_employees_table;
mod m20250101_000005_create_engagement_tables;
mod m20250101_000006_create_audit_and_bug_report_tables;
mod m20250101_000007_create_schedule_exceptions_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_products_tables::Migration),
            Box::new(m20250101_000003_create_orders_tables::Migration),
            Box::new(m20250101_000004_create_employees_table::Migration),
            Box::new(m20250101_000005_create_engagement_tables::Migration),
            Box::new(m20250101_000006_create_audit_and_bug_report_tables::Migration),
            Box::new(m20250101_000007_create_schedule_exceptions_table::Migration),
        ]
    }
}
