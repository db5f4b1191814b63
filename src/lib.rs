//! Tradepost API Library
//!
//! Marketplace backend where stores order stock from suppliers: catalog and
//! stock history, the draft-to-delivery order workflow, messaging, ratings,
//! employees and the admin tooling around them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod storage;
pub mod tracing;

use std::{any::Any, sync::Arc, time::Duration};

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json, Router,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{self, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
};

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::middleware_helpers::{audit_middleware, request_id_middleware, AuditLogger};
use crate::storage::{ObjectStorage, UPLOADS_ROUTE};

/// Upper bound on any single request, uploads included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the auth service and every domain service from one configuration.
    pub fn new(
        db: Arc<DbPool>,
        config: AppConfig,
        event_sender: EventSender,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            Duration::from_secs(config.jwt_expiration_secs),
        )));
        let event_sender = Arc::new(event_sender);
        let services = handlers::AppServices::new(
            db.clone(),
            &config,
            event_sender.clone(),
            auth.clone(),
            storage.clone(),
        );

        Self {
            db,
            config,
            event_sender,
            auth,
            storage,
            services,
        }
    }
}

/// Everything served under `/api`. Registration and login are public, the
/// rest requires a bearer token.
pub fn api_routes(config: &AppConfig) -> Router<AppState> {
    let protected = Router::new()
        .merge(handlers::users::user_routes())
        .merge(handlers::directory::directory_routes())
        .merge(handlers::schedule::schedule_routes())
        .merge(handlers::products::product_routes())
        .merge(handlers::orders::order_routes())
        .merge(handlers::messages::message_routes())
        .merge(handlers::ratings::rating_routes())
        .merge(handlers::employees::employee_routes())
        .merge(handlers::uploads::upload_routes(config.max_upload_bytes))
        .merge(handlers::analytics::analytics_routes())
        .merge(handlers::audit_logs::audit_log_routes())
        .merge(handlers::bug_reports::bug_report_routes())
        .with_auth();

    Router::new()
        .merge(handlers::auth::public_routes())
        .merge(protected)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any)
    } else if config.is_production() {
        ::tracing::warn!("no CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ::tracing::error!(panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}

/// Builds the complete HTTP application: API, health probes, Swagger UI,
/// uploaded files and the shared middleware stack.
pub fn app(state: AppState) -> Router {
    let config = &state.config;
    let audit = AuditLogger::new(
        state.db.clone(),
        Duration::from_millis(config.audit_flush_delay_ms),
        config.audit_body_limit,
    );

    Router::new()
        .nest("/api", api_routes(config))
        .nest("/health", handlers::health::health_routes())
        .merge(openapi::swagger_ui())
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&config.upload_dir))
        // Audit sits outside auth so it sees the resolved caller on the response
        .layer(axum::middleware::from_fn_with_state(audit, audit_middleware))
        .layer(Extension(state.auth.clone()))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors_layer(config))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub mod prelude {
    pub use crate::auth::AuthUser;
    pub use crate::config::AppConfig;
    pub use crate::db::DbPool;
    pub use crate::entities::user::Role;
    pub use crate::errors::{ErrorResponse, ServiceError};
    pub use crate::events::{Event, EventSender};
    pub use crate::services::{Paginated, Pagination};
    pub use crate::{app, AppState};
}
