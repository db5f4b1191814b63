#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use tradepost_api::{
    auth::hash_password,
    db,
    entities::{product, user},
    events,
    notifications::{Mailer, MemoryMailer},
    prelude::*,
    storage::{LocalStorage, ObjectStorage},
};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const TEST_PASSWORD: &str = "secret123";

/// Helper harness backed by a throwaway SQLite file with migrations applied.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: MemoryMailer,
    _dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("tradepost_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.audit_flush_delay_ms = 0;
        cfg.upload_dir = dir.path().join("uploads").display().to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let mailer = MemoryMailer::new();
        let (event_sender, event_rx) = events::channel();
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            db_arc.clone(),
            Arc::new(mailer.clone()) as Arc<dyn Mailer>,
        ));

        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(
            &cfg.upload_dir,
            "http://localhost:3020",
        ));

        let state = AppState::new(db_arc, cfg, event_sender, storage);
        let router = app(state.clone());

        Self {
            router,
            state,
            mailer,
            _dir: dir,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Same as [`request`](Self::request) but decodes the JSON body.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    /// Posts a single-file multipart form under the `file` field.
    pub async fn upload(
        &self,
        uri: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
        token: &str,
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "tradepost-test-boundary";
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("failed to build upload request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during upload");
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request_json(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
        self.request_json(Method::POST, uri, Some(body), Some(token))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
        self.request_json(Method::PUT, uri, Some(body), Some(token))
            .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request_json(Method::DELETE, uri, None, Some(token))
            .await
    }

    /// Insert an account directly and mint a token for it.
    pub async fn seed_user(&self, role: Role, admin_level: Option<i32>) -> (user::Model, String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let account = user::ActiveModel {
            email: Set(format!("{}-{}@example.com", role, &suffix[..8])),
            password_hash: Set(hash_password(TEST_PASSWORD).expect("hash password")),
            name: Set(format!("{} {}", role, &suffix[..6])),
            phone: Set(format!("09{}", &suffix[..9])),
            role: Set(role),
            admin_level: Set(admin_level),
            address: Set(Some("12 Rizal Ave, Quezon City".to_string())),
            is_open: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed user");

        let token = self
            .state
            .auth
            .generate_token(&account)
            .expect("generate token");
        (account, token)
    }

    pub async fn seed_supplier(&self) -> (user::Model, String) {
        self.seed_user(Role::Supplier, None).await
    }

    pub async fn seed_store(&self) -> (user::Model, String) {
        self.seed_user(Role::Store, None).await
    }

    pub async fn seed_admin(&self, level: i32) -> (user::Model, String) {
        self.seed_user(Role::Admin, Some(level)).await
    }

    pub async fn seed_product(
        &self,
        supplier_id: i32,
        price: i64,
        stock: i32,
    ) -> product::Model {
        let now = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        product::ActiveModel {
            supplier_id: Set(supplier_id),
            name: Set(format!("Rice {}", &suffix[..6])),
            sku: Set(format!("SKU-{}", &suffix[..10])),
            price: Set(Decimal::from(price)),
            stock_quantity: Set(stock),
            unit: Set(Some("kg".to_string())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed product")
    }

    pub async fn product_stock(&self, product_id: i32) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(self.state.db.as_ref())
            .await
            .expect("load product")
            .expect("product exists")
            .stock_quantity
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }
}

/// Decimals serialize as strings; accept either form.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}

pub fn error_message(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}
