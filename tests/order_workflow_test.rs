mod common;

use axum::http::StatusCode;
use common::{decimal, error_message, TestApp};
use rust_decimal::Decimal;
use serde_json::json;

fn item_id(order: &serde_json::Value, product_id: i32) -> i64 {
    order["items"]
        .as_array()
        .expect("items array")
        .iter()
        .find(|i| i["product_id"] == json!(product_id))
        .and_then(|i| i["id"].as_i64())
        .expect("order line for product")
}

#[tokio::test]
async fn draft_items_keep_total_and_stock_in_sync() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 20).await;

    let (status, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draft["status"], "draft");
    assert_eq!(decimal(&draft["total_amount"]), Decimal::ZERO);
    let order_id = draft["id"].as_i64().unwrap();

    let (status, order) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": rice.id, "quantity": 5 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(500));
    assert_eq!(app.product_stock(rice.id).await, 15);

    let line = item_id(&order, rice.id);
    let (status, order) = app
        .put(
            &format!("/api/orders/items/{line}"),
            json!({ "quantity": 8 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(800));
    assert_eq!(app.product_stock(rice.id).await, 12);

    let (status, _) = app
        .delete(&format!("/api/orders/items/{line}"), &store_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.product_stock(rice.id).await, 20);

    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    assert_eq!(decimal(&order["total_amount"]), Decimal::ZERO);
    assert!(order["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn draft_creation_is_idempotent_per_supplier() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;

    let (first_status, first) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let (second_status, second) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn adding_more_than_stock_is_rejected() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 3).await;

    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let order_id = draft["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": rice.id, "quantity": 4 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("insufficient stock"), "{body}");
    assert_eq!(app.product_stock(rice.id).await, 3);
}

#[tokio::test]
async fn submit_below_minimum_keeps_the_draft() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 20).await;

    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let order_id = draft["id"].as_i64().unwrap();
    app.post(
        &format!("/api/orders/{order_id}/items"),
        json!({ "product_id": rice.id, "quantity": 5 }),
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
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("minimum order amount"), "{body}");

    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    assert_eq!(order["status"], "draft");
}

#[tokio::test]
async fn submitted_order_moves_forward_only() {
    let app = TestApp::new().await;
    let (supplier, supplier_token) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 1000, 20).await;

    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let order_id = draft["id"].as_i64().unwrap();
    app.post(
        &format!("/api/orders/{order_id}/items"),
        json!({ "product_id": rice.id, "quantity": 6 }),
        &store_token,
    )
    .await;

    let (status, order) = app
        .post(
            &format!("/api/orders/{order_id}/submit"),
            json!({ "payment_method": "gcash", "delivery_option": "deliver" }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "preparing");
    assert_eq!(order["payment_status"], "pending");
    assert!(order["shipping_address"].as_str().is_some());

    // A submitted order is no longer a draft
    let (status, _) = app
        .post(
            &format!("/api/orders/{order_id}/submit"),
            json!({ "payment_method": "gcash", "delivery_option": "deliver" }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .put(
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "delivered" }),
            &supplier_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next in ["in_transit", "delivered"] {
        let (status, order) = app
            .put(
                &format!("/api/orders/{order_id}/status"),
                json!({ "status": next }),
                &supplier_token,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{order}");
        assert_eq!(order["status"], next);
    }

    let (status, order) = app
        .post(&format!("/api/orders/{order_id}/payment/paid"), json!({}), &supplier_token)
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(app.product_stock(rice.id).await, 14);
}

#[tokio::test]
async fn cancelling_restores_stock() {
    let app = TestApp::new().await;
    let (supplier, supplier_token) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 1000, 10).await;

    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let order_id = draft["id"].as_i64().unwrap();
    app.post(
        &format!("/api/orders/{order_id}/items"),
        json!({ "product_id": rice.id, "quantity": 7 }),
        &store_token,
    )
    .await;
    app.post(
        &format!("/api/orders/{order_id}/submit"),
        json!({ "payment_method": "cash_on_delivery", "delivery_option": "pickup" }),
        &store_token,
    )
    .await;
    assert_eq!(app.product_stock(rice.id).await, 3);

    let (status, order) = app
        .put(
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "cancelled" }),
            &supplier_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "cancelled");
    assert_eq!(app.product_stock(rice.id).await, 10);

    let (status, _) = app
        .put(
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "preparing" }),
            &supplier_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suppliers_cannot_see_other_suppliers_orders() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, stranger_token) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;

    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier.id }), &store_token)
        .await;
    let order_id = draft["id"].as_i64().unwrap();

    let (status, _) = app
        .get(&format!("/api/orders/{order_id}"), &stranger_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn draft_with_item(app: &TestApp, supplier_id: i32, token: &str, product_id: i32, quantity: i32) -> i64 {
    let (_, draft) = app
        .post("/api/orders/draft", json!({ "supplier_id": supplier_id }), token)
        .await;
    let order_id = draft["id"].as_i64().expect("draft id");
    let (status, body) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": product_id, "quantity": quantity }),
            token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    order_id
}

#[tokio::test]
async fn adding_the_same_product_merges_into_one_line() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 10).await;

    let order_id = draft_with_item(&app, supplier.id, &store_token, rice.id, 3).await;
    let (status, order) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": rice.id, "quantity": 4 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 7);
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(700));
    assert_eq!(app.product_stock(rice.id).await, 3);

    // Existing line quantity counts against what is left on the shelf
    let (status, body) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": rice.id, "quantity": 3 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("insufficient stock"), "{body}");

    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    assert_eq!(order["items"][0]["quantity"], 7);
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(700));
    assert_eq!(app.product_stock(rice.id).await, 3);
}

#[tokio::test]
async fn huge_quantity_on_an_existing_line_is_insufficient_stock() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 20).await;

    let order_id = draft_with_item(&app, supplier.id, &store_token, rice.id, 1).await;
    let (status, body) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": rice.id, "quantity": i32::MAX }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(error_message(&body).contains("insufficient stock"), "{body}");

    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(100));
    assert_eq!(app.product_stock(rice.id).await, 19);
}

#[tokio::test]
async fn raising_a_line_past_stock_changes_nothing() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 10).await;

    let order_id = draft_with_item(&app, supplier.id, &store_token, rice.id, 4).await;
    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    let line = item_id(&order, rice.id);

    let (status, body) = app
        .put(
            &format!("/api/orders/items/{line}"),
            json!({ "quantity": 11 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("insufficient stock"), "{body}");
    assert_eq!(app.product_stock(rice.id).await, 6);
    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    assert_eq!(order["items"][0]["quantity"], 4);
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(400));

    // Taking exactly what is left drains the shelf
    let (status, order) = app
        .put(
            &format!("/api/orders/items/{line}"),
            json!({ "quantity": 10 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(1000));
    assert_eq!(app.product_stock(rice.id).await, 0);
}

#[tokio::test]
async fn total_covers_every_line() {
    let app = TestApp::new().await;
    let (supplier, _) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 100, 10).await;
    let oil = app.seed_product(supplier.id, 250, 10).await;

    let order_id = draft_with_item(&app, supplier.id, &store_token, rice.id, 2).await;
    let (status, order) = app
        .post(
            &format!("/api/orders/{order_id}/items"),
            json!({ "product_id": oil.id, "quantity": 3 }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(950));

    let line = item_id(&order, rice.id);
    let (status, _) = app
        .delete(&format!("/api/orders/items/{line}"), &store_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = app.get(&format!("/api/orders/{order_id}"), &store_token).await;
    assert_eq!(decimal(&order["total_amount"]), Decimal::from(750));
    assert_eq!(app.product_stock(rice.id).await, 10);
    assert_eq!(app.product_stock(oil.id).await, 7);
}

#[tokio::test]
async fn supplier_reverts_payment_to_pending_once() {
    let app = TestApp::new().await;
    let (supplier, supplier_token) = app.seed_supplier().await;
    let (_, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 1000, 20).await;

    let order_id = draft_with_item(&app, supplier.id, &store_token, rice.id, 6).await;
    let (status, order) = app
        .post(
            &format!("/api/orders/{order_id}/submit"),
            json!({ "payment_method": "cash_on_delivery", "delivery_option": "pickup" }),
            &store_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["payment_status"], "paid");

    let uri = format!("/api/orders/{order_id}/payment/pending");
    let (status, _) = app.post(&uri, json!({}), &store_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, order) = app.post(&uri, json!({}), &supplier_token).await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["payment_status"], "pending");

    let (status, body) = app.post(&uri, json!({}), &supplier_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "payment is already pending");

    // Cash orders cannot be confirmed through the GCash path
    let (status, body) = app
        .post(&format!("/api/orders/{order_id}/payment/paid"), json!({}), &supplier_token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "payment confirmation is only applicable for GCash orders"
    );
}

#[tokio::test]
async fn invoice_is_stored_and_mailed_to_the_store() {
    let app = TestApp::new().await;
    let (supplier, supplier_token) = app.seed_supplier().await;
    let (store, store_token) = app.seed_store().await;
    let rice = app.seed_product(supplier.id, 1000, 20).await;

    let order_id = draft_with_item(&app, supplier.id, &store_token, rice.id, 5).await;
    let (status, _) = app
        .get(&format!("/api/orders/{order_id}/invoice"), &store_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "drafts have no invoice");

    app.post(
        &format!("/api/orders/{order_id}/submit"),
        json!({ "payment_method": "cash_on_delivery", "delivery_option": "pickup" }),
        &store_token,
    )
    .await;

    let (status, link) = app
        .get(&format!("/api/orders/{order_id}/invoice"), &store_token)
        .await;
    assert_eq!(status, StatusCode::OK, "{link}");
    let url = link["invoice_url"].as_str().unwrap();
    assert!(url.ends_with(&format!("/uploads/invoices/{order_id}.txt")), "{url}");

    let stored = std::path::Path::new(&app.state.config.upload_dir)
        .join(format!("invoices/{order_id}.txt"));
    let document = std::fs::read_to_string(stored).expect("invoice written");
    assert!(document.contains(&format!("INVOICE No: {order_id}")));
    assert!(document.contains(&rice.name));

    let (status, sent) = app
        .post(&format!("/api/orders/{order_id}/send-invoice"), json!({}), &supplier_token)
        .await;
    assert_eq!(status, StatusCode::OK, "{sent}");
    assert_eq!(sent["to"], store.email.as_str());
    assert_eq!(sent["invoice_url"], url);

    let subject = format!("Invoice for order #{order_id}");
    let mut delivered = false;
    for _ in 0..50 {
        if app.mailer.sent().iter().any(|m| m.subject == subject && m.to == store.email) {
            delivered = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(delivered, "invoice email was not sent");
}
