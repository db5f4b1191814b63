mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{error_message, TestApp, TEST_PASSWORD};
use rstest::rstest;
use serde_json::json;

fn registration(email: &str, phone: &str, role: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": TEST_PASSWORD,
        "name": "Sari-Sari Corner",
        "phone": phone,
        "role": role,
        "address": "Blk 4 Lot 2, Pasig"
    })
}

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;

    let (status, registered) = app
        .request_json(
            Method::POST,
            "/api/register",
            Some(registration("corner@example.com", "09170000001", "store")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{registered}");
    assert!(registered["token"].as_str().is_some());
    assert_eq!(registered["user"]["role"], "store");
    assert!(registered["user"].get("password_hash").is_none());

    let (status, session) = app
        .request_json(
            Method::POST,
            "/api/login",
            Some(json!({ "email": "corner@example.com", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{session}");
    let token = session["token"].as_str().unwrap();

    let (status, me) = app.get("/api/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "corner@example.com");

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/login",
            Some(json!({ "email": "corner@example.com", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "invalid email or password");
}

#[tokio::test]
async fn registration_rejects_duplicates_and_bad_roles() {
    let app = TestApp::new().await;
    app.request_json(
        Method::POST,
        "/api/register",
        Some(registration("dupe@example.com", "09170000002", "supplier")),
        None,
    )
    .await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/register",
            Some(registration("dupe@example.com", "09170000003", "supplier")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_message(&body), "email already exists");

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/register",
            Some(registration("other@example.com", "09170000002", "supplier")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_message(&body), "phone already exists");

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/register",
            Some(registration("admin@example.com", "09170000004", "admin")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "role must be 'supplier' or 'store'");
}

#[tokio::test]
async fn registration_queues_a_welcome_email() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/register",
            Some(registration("welcome@example.com", "09170000005", "store")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut delivered = false;
    for _ in 0..50 {
        if app
            .mailer
            .sent()
            .iter()
            .any(|m| m.to == "welcome@example.com")
        {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(delivered, "welcome email was not sent");
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = TestApp::new().await;

    let (status, body) = app.request_json(Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "authorization header required");

    let (status, body) = app.get("/api/me", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "invalid token");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn directories_are_role_gated() {
    let app = TestApp::new().await;
    let (supplier, supplier_token) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    app.seed_product(supplier.id, 100, 5).await;

    let (status, suppliers) = app.get("/api/suppliers", &store_token).await;
    assert_eq!(status, StatusCode::OK, "{suppliers}");
    let entry = suppliers
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == json!(supplier.id))
        .expect("supplier listed");
    assert_eq!(entry["product_count"], 1);

    let (status, body) = app.get("/api/suppliers", &supplier_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_message(&body), "only stores and admins can view suppliers");

    let (status, body) = app.get("/api/stores", &store_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_message(&body), "only suppliers and admins can view stores");
}

#[rstest]
#[case(1, "admin", Some(2), StatusCode::CREATED)]
#[case(2, "admin", Some(3), StatusCode::CREATED)]
#[case(2, "admin", Some(2), StatusCode::FORBIDDEN)]
#[case(2, "store", None, StatusCode::CREATED)]
#[case(3, "store", None, StatusCode::FORBIDDEN)]
#[tokio::test]
async fn admin_registration_respects_levels(
    #[case] caller_level: i32,
    #[case] role: &str,
    #[case] admin_level: Option<i32>,
    #[case] expected: StatusCode,
) {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_admin(caller_level).await;

    let mut body = registration("new-account@example.com", "09179999999", role);
    body["admin_level"] = json!(admin_level);
    let (status, response) = app.post("/api/users/register", body, &admin_token).await;
    assert_eq!(status, expected, "{response}");
}

#[tokio::test]
async fn non_admins_cannot_list_users() {
    let app = TestApp::new().await;
    let (_, store_token) = app.seed_store().await;
    let (_, admin_token) = app.seed_admin(3).await;

    let (status, body) = app.get("/api/users", &store_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_message(&body), "only admin can access this resource");

    let (status, users) = app.get("/api/users", &admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(users.as_array().unwrap().len() >= 2);
}
