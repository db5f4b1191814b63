mod common;

use axum::http::StatusCode;
use common::{error_message, TestApp};
use serde_json::json;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[tokio::test]
async fn owners_toggle_their_open_flag() {
    let app = TestApp::new().await;
    let (_, supplier_token) = app.seed_supplier().await;

    let (status, body) = app.post("/api/me/open", json!({}), &supplier_token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_message(&body), "store is already open");

    let (status, me) = app.post("/api/me/close", json!({}), &supplier_token).await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["is_open"], false);

    let (status, body) = app.post("/api/me/close", json!({}), &supplier_token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_message(&body), "store is already closed");

    let (status, me) = app.post("/api/me/open", json!({}), &supplier_token).await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["is_open"], true);
}

#[tokio::test]
async fn admins_have_no_open_flag() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_admin(1).await;

    let (status, _) = app.post("/api/me/close", json!({}), &admin_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn product_images_land_under_the_supplier_prefix() {
    let app = TestApp::new().await;
    let (supplier, supplier_token) = app.seed_supplier().await;

    let (status, uploaded) = app
        .upload(
            "/api/upload?type=product",
            "Rice Sack.PNG",
            "image/png",
            PNG_HEADER,
            &supplier_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{uploaded}");

    let key = uploaded["key"].as_str().unwrap();
    assert!(key.starts_with(&format!("products/{}/", supplier.id)), "{key}");
    assert!(key.ends_with(".png"), "{key}");
    assert!(uploaded["url"].as_str().unwrap().ends_with(key));

    let stored = std::path::Path::new(&app.state.config.upload_dir).join(key);
    assert_eq!(std::fs::read(stored).expect("uploaded file"), PNG_HEADER);
}

#[tokio::test]
async fn uploads_accept_images_only() {
    let app = TestApp::new().await;
    let (_, store_token) = app.seed_store().await;

    let (status, body) = app
        .upload("/api/upload", "notes.txt", "text/plain", b"hello", &store_token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "invalid file type. Only images are allowed");
}
