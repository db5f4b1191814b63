mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{error_message, TestApp};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use serde_json::json;
use tradepost_api::entities::order;

struct Parties {
    store_token: String,
    supplier_token: String,
    order_id: i64,
}

/// Walks a fresh order through submission, optionally all the way to delivered.
async fn submitted_order(app: &TestApp, deliver: bool) -> Parties {
    let (supplier, supplier_token) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let product = app.seed_product(supplier.id, 2500, 10).await;

    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let order_id = draft["id"].as_i64().unwrap();
    app.post(
        &format!("/api/orders/{order_id}/items"),
        json!({ "product_id": product.id, "quantity": 2 }),
        &store_token,
    )
    .await;
    let (status, body) = app
        .post(
            &format!("/api/orders/{order_id}/submit"),
            json!({ "payment_method": "cash_on_delivery", "delivery_option": "pickup" }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    if deliver {
        for next in ["in_transit", "delivered"] {
            let (status, body) = app
                .put(
                    &format!("/api/orders/{order_id}/status"),
                    json!({ "status": next }),
                    &supplier_token,
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }
    }

    Parties {
        store_token,
        supplier_token,
        order_id,
    }
}

#[tokio::test]
async fn parties_exchange_messages_and_reads_are_marked() {
    let app = TestApp::new().await;
    let p = submitted_order(&app, false).await;
    let uri = format!("/api/orders/{}/messages", p.order_id);

    let (status, sent) = app
        .post(&uri, json!({ "content": "Can you deliver before noon?" }), &p.store_token)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{sent}");
    assert!(sent["read_at"].is_null());

    let (status, thread) = app.get(&uri, &p.supplier_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread.as_array().unwrap().len(), 1);
    assert!(!thread[0]["read_at"].is_null());

    let (status, body) = app
        .post(&uri, json!({ "content": "   " }), &p.supplier_token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "message must have either content or an image"
    );
}

#[tokio::test]
async fn outsiders_cannot_read_a_conversation() {
    let app = TestApp::new().await;
    let p = submitted_order(&app, false).await;
    let (_, outsider) = app.seed_store().await;

    let (status, _) = app
        .get(&format!("/api/orders/{}/messages", p.order_id), &outsider)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messaging_closes_after_the_delivery_window() {
    let app = TestApp::new().await;
    let p = submitted_order(&app, true).await;
    let uri = format!("/api/orders/{}/messages", p.order_id);

    let (status, _) = app
        .post(&uri, json!({ "content": "Received, thanks!" }), &p.store_token)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let db = app.state.db.as_ref();
    let delivered = order::Entity::find_by_id(p.order_id as i32)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut stale = delivered.into_active_model();
    stale.updated_at = Set(Utc::now() - Duration::hours(13));
    stale.update(db).await.unwrap();

    let (status, body) = app
        .post(&uri, json!({ "content": "One more thing" }), &p.store_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(error_message(&body).starts_with("messaging is closed"), "{body}");
}

#[tokio::test]
async fn only_delivered_orders_can_be_rated_once() {
    let app = TestApp::new().await;
    let pending = submitted_order(&app, false).await;
    let (status, body) = app
        .post(
            &format!("/api/orders/{}/rating", pending.order_id),
            json!({ "rating": 5 }),
            &pending.store_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "can only rate delivered orders");

    let p = submitted_order(&app, true).await;
    let uri = format!("/api/orders/{}/rating", p.order_id);
    let (status, rating) = app
        .post(&uri, json!({ "rating": 4, "comment": "Fresh stock" }), &p.store_token)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{rating}");

    let (status, body) = app.post(&uri, json!({ "rating": 1 }), &p.store_token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_message(&body), "you have already rated this order");

    // The supplier rates the store independently
    let (status, _) = app.post(&uri, json!({ "rating": 5 }), &p.supplier_token).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, mine) = app.get("/api/me/ratings", &p.supplier_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["rating_count"], 1);
    assert_eq!(mine["average_rating"], 4.0);
}

#[tokio::test]
async fn rating_values_are_bounded() {
    let app = TestApp::new().await;
    let p = submitted_order(&app, true).await;
    let (status, _) = app
        .post(
            &format!("/api/orders/{}/rating", p.order_id),
            json!({ "rating": 6 }),
            &p.store_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
