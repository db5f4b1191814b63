pub mod analytics;
pub mod audit_logs;
pub mod auth;
pub mod bug_reports;
pub mod common;
pub mod directory;
pub mod employees;
pub mod health;
pub mod messages;
pub mod orders;
pub mod products;
pub mod ratings;
pub mod schedule;
pub mod uploads;
pub mod users;

use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        accounts::AccountService, analytics::AnalyticsService, audit::AuditLogService,
        bug_reports::BugReportService, directory::DirectoryService, employees::EmployeeService,
        invoicing::InvoiceService, messages::MessageService, orders::OrderService,
        products::ProductService, ratings::RatingService, schedule::ScheduleService,
        stock_history::StockHistoryService, uploads::UploadService, users::UserService,
    },
    storage::ObjectStorage,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub users: Arc<UserService>,
    pub directory: Arc<DirectoryService>,
    pub schedule: Arc<ScheduleService>,
    pub products: Arc<ProductService>,
    pub stock_history: Arc<StockHistoryService>,
    pub orders: Arc<OrderService>,
    pub invoices: Arc<InvoiceService>,
    pub messages: Arc<MessageService>,
    pub ratings: Arc<RatingService>,
    pub employees: Arc<EmployeeService>,
    pub audit_logs: Arc<AuditLogService>,
    pub bug_reports: Arc<BugReportService>,
    pub analytics: Arc<AnalyticsService>,
    pub uploads: Arc<UploadService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let schedule = ScheduleService::new(db_pool.clone());
        let orders = OrderService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            config.min_order_amount,
        );

        Self {
            accounts: Arc::new(AccountService::new(
                db_pool.clone(),
                auth_service,
                Some(event_sender.clone()),
            )),
            users: Arc::new(UserService::new(db_pool.clone())),
            directory: Arc::new(DirectoryService::new(db_pool.clone(), schedule.clone())),
            schedule: Arc::new(schedule),
            products: Arc::new(ProductService::new(db_pool.clone())),
            stock_history: Arc::new(StockHistoryService::new(db_pool.clone())),
            invoices: Arc::new(InvoiceService::new(
                db_pool.clone(),
                storage.clone(),
                Some(event_sender),
            )),
            messages: Arc::new(MessageService::new(
                db_pool.clone(),
                config.messaging_window_hours,
            )),
            ratings: Arc::new(RatingService::new(db_pool.clone())),
            employees: Arc::new(EmployeeService::new(db_pool.clone())),
            audit_logs: Arc::new(AuditLogService::new(db_pool.clone())),
            bug_reports: Arc::new(BugReportService::new(db_pool.clone())),
            analytics: Arc::new(AnalyticsService::new(db_pool, orders.clone())),
            orders: Arc::new(orders),
            uploads: Arc::new(UploadService::new(storage, config.max_upload_bytes)),
        }
    }
}
