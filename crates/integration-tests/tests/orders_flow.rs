//! Integration tests for checkout and order management.

#![allow(clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};
use shoplane_integration_tests::{PASSWORD, TestApp, assert_money, body};

fn shipping() -> Value {
    json!({
        "name": "Asha Rao",
        "street": "12 MG Road",
        "city": "Bengaluru",
        "state": "KA",
        "postalCode": "560001",
        "phone": "+91 80 5555 0101"
    })
}

async fn signed_in() -> TestApp {
    let app = TestApp::spawn().await;
    let resp = app.register("Asha Rao", "asha@example.com").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    app
}

/// Place an order for one unit of product 1 and return its id.
async fn place_simple_order(app: &TestApp) -> i64 {
    let resp = app
        .post(
            "/api/orders",
            &json!({
                "items": [{ "productId": 1, "quantity": 1 }],
                "shippingAddress": shipping(),
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body(resp).await["order"]["id"].as_i64().expect("order id")
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_order_from_cart_empties_it() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 1, "quantity": 2 }))
        .await;
    app.post("/api/cart/add", &json!({ "productId": 2 })).await;
    app.post("/api/cart/save-for-later/2", &json!({})).await;

    let resp = app
        .post(
            "/api/orders",
            &json!({ "shippingAddress": shipping(), "paymentMethod": "upi" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body(resp).await;
    assert_eq!(json["message"], "Order placed successfully");
    assert_eq!(json["order"]["status"], "pending");
    assert_eq!(json["order"]["estimatedDelivery"], "3-5 business days");
    assert_money(&json["order"]["total"], 27.59);

    // Ordered lines leave the cart, saved ones stay.
    let cart = body(app.get("/api/cart").await).await;
    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["savedForLater"][0]["productId"], 2);
}

#[tokio::test]
async fn test_order_with_explicit_items() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 1 })).await;

    let resp = app
        .post(
            "/api/orders",
            &json!({
                "items": [
                    { "productId": 2, "quantity": 1 },
                    { "productId": 4 }
                ],
                "shippingAddress": shipping(),
                "paymentMethod": "cod",
                "notes": "  Leave at the gate  "
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body(resp).await["order"]["id"].as_i64().expect("id");

    let order = body(app.get(&format!("/api/orders/{id}")).await).await["order"].clone();
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(order["paymentMethod"], "cod");
    assert_eq!(order["notes"], "Leave at the gate");
    assert_eq!(order["shippingAddress"]["city"], "Bengaluru");
    // 249.98 ships free, tax 20.00
    assert_money(&order["pricing"]["subtotal"], 249.98);
    assert_money(&order["pricing"]["shipping"], 0.0);
    assert_money(&order["pricing"]["tax"], 20.0);
    assert_money(&order["pricing"]["total"], 269.98);

    // An explicit order leaves the cart alone.
    let cart = body(app.get("/api/cart").await).await;
    assert_eq!(cart["items"][0]["productId"], 1);
}

#[tokio::test]
async fn test_empty_cart_cannot_checkout() {
    let app = signed_in().await;

    let resp = app
        .post("/api/orders", &json!({ "shippingAddress": shipping() }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(resp).await["message"], "Order must have items");
}

#[tokio::test]
async fn test_checkout_validation() {
    let app = signed_in().await;

    let resp = app
        .post(
            "/api/orders",
            &json!({
                "items": [{ "productId": 0 }],
                "shippingAddress": { "name": "Asha Rao" },
                "paymentMethod": "barter"
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let fields: Vec<String> = body(resp).await["details"]
        .as_array()
        .expect("details")
        .iter()
        .filter_map(|d| d["field"].as_str().map(str::to_owned))
        .collect();
    assert!(fields.contains(&"items[0].productId".to_owned()));
    assert!(fields.contains(&"shippingAddress.street".to_owned()));
    assert!(fields.contains(&"shippingAddress.postalCode".to_owned()));
    assert!(fields.contains(&"paymentMethod".to_owned()));
}

#[tokio::test]
async fn test_checkout_rejects_unavailable_products() {
    let app = signed_in().await;

    let resp = app
        .post(
            "/api/orders",
            &json!({ "items": [{ "productId": 3 }], "shippingAddress": shipping() }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .post(
            "/api/orders",
            &json!({ "items": [{ "productId": 999 }], "shippingAddress": shipping() }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_totals_stay_within_ledger_limits() {
    let app = TestApp::spawn().await;
    app.register_admin("admin@shoplane.test").await;

    let product = json!({
        "title": "Private Island",
        "description": "Comes with a lighthouse",
        "image": "https://cdn.shoplane.test/island.jpg",
        "category": "Home & Kitchen",
        "brand": "Archipelago"
    });
    let mut too_dear = product.clone();
    too_dear["price"] = json!(1e28);
    let resp = app.post("/api/products", &too_dear).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(resp).await["details"][0]["field"], "price");

    let mut at_limit = product;
    at_limit["price"] = json!(9_999_999_999.99);
    let created = body(app.post("/api/products", &at_limit).await).await;
    let id = created["product"]["id"].as_i64().expect("id");

    // The cart keeps serving its totals, and checkout refuses cleanly.
    let resp = app
        .post("/api/cart/add", &json!({ "productId": id, "quantity": 2 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.get("/api/cart").await.status(), StatusCode::OK);

    let resp = app
        .post("/api/orders", &json!({ "shippingAddress": shipping() }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(resp).await["message"],
        "Order total exceeds 9999999999.99"
    );
}

// ============================================================================
// History & Ownership
// ============================================================================

#[tokio::test]
async fn test_order_history_newest_first() {
    let app = signed_in().await;
    let first = place_simple_order(&app).await;
    let second = place_simple_order(&app).await;

    let json = body(app.get("/api/orders").await).await;
    let orders = json["orders"].as_array().expect("orders");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], second);
    assert_eq!(orders[1]["id"], first);
    assert_eq!(orders[0]["itemCount"], 1);
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = signed_in().await;
    let id = place_simple_order(&app).await;

    let other = app.other_client();
    other
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Ben Okafor", "email": "ben@example.com", "password": PASSWORD }))
        .send()
        .await
        .expect("register");

    let resp = other
        .get(app.url(&format!("/api/orders/{id}")))
        .send()
        .await
        .expect("order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = other
        .post(app.url(&format!("/api/orders/{id}/cancel")))
        .send()
        .await
        .expect("cancel");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let history = other
        .get(app.url("/api/orders"))
        .send()
        .await
        .expect("history")
        .json::<Value>()
        .await
        .expect("json");
    assert_eq!(history["orders"], json!([]));
}

// ============================================================================
// Cancellation & Fulfillment
// ============================================================================

#[tokio::test]
async fn test_cancel_pending_order() {
    let app = signed_in().await;
    let id = place_simple_order(&app).await;

    let resp = app
        .post(
            &format!("/api/orders/{id}/cancel"),
            &json!({ "reason": "Ordered the wrong colour" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body(resp).await;
    assert_eq!(json["message"], "Order cancelled successfully");
    assert_eq!(json["order"]["status"], "cancelled");
    assert_eq!(json["order"]["cancelReason"], "Ordered the wrong colour");

    let again = app
        .client
        .post(app.url(&format!("/api/orders/{id}/cancel")))
        .send()
        .await
        .expect("cancel");
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(again).await["message"],
        "Only pending orders can be cancelled"
    );
}

#[tokio::test]
async fn test_admin_advances_status() {
    let app = TestApp::spawn().await;

    // Customer places the order on a separate client.
    let customer = app.other_client();
    customer
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Asha Rao", "email": "asha@example.com", "password": PASSWORD }))
        .send()
        .await
        .expect("register");
    let placed = customer
        .post(app.url("/api/orders"))
        .json(&json!({
            "items": [{ "productId": 4 }],
            "shippingAddress": shipping(),
            "paymentMethod": "cod"
        }))
        .send()
        .await
        .expect("order")
        .json::<Value>()
        .await
        .expect("json");
    let id = placed["order"]["id"].as_i64().expect("id");

    // Only administrators change status.
    let resp = customer
        .patch(app.url(&format!("/api/orders/{id}/status")))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .expect("patch");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    app.register_admin("admin@shoplane.test").await;
    let path = format!("/api/orders/{id}/status");

    let skip = app.patch(&path, &json!({ "status": "shipped" })).await;
    assert_eq!(skip.status(), StatusCode::BAD_REQUEST);

    let unknown = app.patch(&path, &json!({ "status": "teleported" })).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    for status in ["confirmed", "processing"] {
        let resp = app.patch(&path, &json!({ "status": status })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await["order"]["status"], status);
    }
    let shipped = body(
        app.patch(
            &path,
            &json!({ "status": "shipped", "trackingNumber": "1Z999AA10123456784" }),
        )
        .await,
    )
    .await;
    assert_eq!(shipped["order"]["trackingNumber"], "1Z999AA10123456784");

    let delivered = body(app.patch(&path, &json!({ "status": "delivered" })).await).await;
    assert_eq!(delivered["order"]["status"], "delivered");
    assert_eq!(delivered["order"]["paymentStatus"], "paid");
    assert!(delivered["order"]["deliveredAt"].is_string());

    // Too late for the customer to cancel.
    let resp = customer
        .post(app.url(&format!("/api/orders/{id}/cancel")))
        .send()
        .await
        .expect("cancel");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .patch("/api/orders/9999/status", &json!({ "status": "confirmed" }))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
