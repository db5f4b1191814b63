use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tradepost API",
        version = "0.3.0",
        description = r#"
# Tradepost Marketplace API

Backend for a B2B marketplace where stores order stock from suppliers.

## Features

- **Catalog**: Supplier products with an append-only stock history
- **Orders**: Draft, submit, prepare, ship and deliver with stock kept in sync
- **Messaging**: Per-order conversation between store and supplier
- **Ratings**: Two-way ratings on delivered orders
- **Employees**: Capability-restricted sub-accounts
- **Administration**: Audit logs, bug reports and analytics

## Authentication

Everything except registration and login requires a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors carry a JSON body with a single message and the request id:

```json
{
  "error": "insufficient stock: only 3 kg available",
  "request_id": "0f1c2d9e-6a4b-4c1e-9d59-0f0e7d6b1a22"
}
```

## Pagination

Audit logs and bug reports accept `page` (default 1) and `limit` (default 50, max 100)
and answer with `{data, pagination: {page, limit, total, pages}}`.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:3020", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "The caller's own profile"),
        (name = "Directory", description = "Supplier and store listings"),
        (name = "Products", description = "Catalog and stock history"),
        (name = "Orders", description = "Order workflow, payment and invoices"),
        (name = "Messages", description = "Order conversations"),
        (name = "Ratings", description = "Ratings on delivered orders"),
        (name = "Employees", description = "Employee sub-accounts"),
        (name = "Schedule", description = "Opening-hour exceptions"),
        (name = "Uploads", description = "Image uploads"),
        (name = "Analytics", description = "Account and marketplace analytics"),
        (name = "Bug Reports", description = "In-app bug reports"),
        (name = "Admin", description = "Administrative endpoints")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::employee_login,

        // Users
        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::users::open_store,
        crate::handlers::users::close_store,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::admin_register_user,

        // Directory
        crate::handlers::directory::list_suppliers,
        crate::handlers::directory::list_stores,
        crate::handlers::directory::supplier_products,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::bulk_create_products,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::restore_product,
        crate::handlers::products::reset_stocks,
        crate::handlers::products::list_stock_history,
        crate::handlers::products::product_stock_history,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_draft_order,
        crate::handlers::orders::create_draft_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::add_order_item,
        crate::handlers::orders::update_order_item,
        crate::handlers::orders::remove_order_item,
        crate::handlers::orders::submit_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::mark_payment_paid,
        crate::handlers::orders::mark_payment_pending,
        crate::handlers::orders::send_invoice,
        crate::handlers::orders::get_invoice,

        // Messages and ratings
        crate::handlers::messages::list_messages,
        crate::handlers::messages::send_message,
        crate::handlers::ratings::rate_order,
        crate::handlers::ratings::my_ratings,
        crate::handlers::ratings::ratings_summary,
        crate::handlers::ratings::rated_orders,

        // Employees
        crate::handlers::employees::list_employees,
        crate::handlers::employees::create_employee,
        crate::handlers::employees::update_employee,
        crate::handlers::employees::current_employee,

        // Schedule
        crate::handlers::schedule::list_exceptions,
        crate::handlers::schedule::create_exception,
        crate::handlers::schedule::bulk_create_exceptions,
        crate::handlers::schedule::update_exception,
        crate::handlers::schedule::delete_exception,

        // Uploads
        crate::handlers::uploads::upload_image,

        // Analytics
        crate::handlers::analytics::my_analytics,
        crate::handlers::analytics::user_analytics,
        crate::handlers::analytics::dashboard_analytics,

        // Admin
        crate::handlers::audit_logs::list_audit_logs,
        crate::handlers::bug_reports::create_bug_report,
        crate::handlers::bug_reports::list_bug_reports,
        crate::handlers::bug_reports::get_bug_report,
        crate::handlers::bug_reports::update_bug_report,
        crate::handlers::bug_reports::delete_bug_report,
    ),
    components(
        schemas(
            // Accounts
            crate::services::accounts::RegisterRequest,
            crate::services::accounts::LoginRequest,
            crate::services::accounts::EmployeeLoginRequest,
            crate::services::accounts::AuthResponse,
            crate::services::accounts::EmployeeAuthResponse,
            crate::services::accounts::RegisteredUser,
            crate::services::users::UpdateProfileRequest,
            crate::services::directory::DirectoryEntry,

            // Catalog
            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::BulkCreateProductsRequest,
            crate::services::products::BulkCreateProductsResult,
            crate::services::stock_history::StockHistoryPage,

            // Orders
            crate::services::orders::CreateDraftRequest,
            crate::services::orders::AddItemRequest,
            crate::services::orders::UpdateItemRequest,
            crate::services::orders::SubmitOrderRequest,
            crate::services::orders::UpdateStatusRequest,
            crate::services::orders::PartySummary,
            crate::services::invoicing::InvoiceLink,
            crate::services::invoicing::InvoiceSent,
            crate::services::messages::SendMessageRequest,
            crate::services::ratings::CreateRatingRequest,
            crate::services::ratings::MyRatings,
            crate::services::ratings::RatingsSummary,
            crate::services::ratings::RatedOrders,
            crate::services::ratings::SupplierRatingSummary,
            crate::services::ratings::StoreRatingSummary,
            crate::services::ratings::OrderRatingSummary,

            // Employees and schedule
            crate::services::employees::CreateEmployeeRequest,
            crate::services::employees::UpdateEmployeeRequest,
            crate::services::schedule::CreateScheduleExceptionRequest,
            crate::services::schedule::BulkScheduleExceptionRequest,
            crate::services::schedule::UpdateScheduleExceptionRequest,
            crate::services::schedule::BulkCreateResult,

            // Admin
            crate::services::bug_reports::CreateBugReportRequest,
            crate::services::bug_reports::UpdateBugReportRequest,
            crate::services::uploads::UploadedFile,
            crate::services::Pagination,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_the_order_workflow() {
        let doc = ApiDocV1::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/orders/draft"));
        assert!(paths.contains_key("/api/orders/{id}/submit"));
        assert!(paths.contains_key("/api/orders/items/{item_id}"));
        assert!(paths.contains_key("/api/register"));
    }
}
