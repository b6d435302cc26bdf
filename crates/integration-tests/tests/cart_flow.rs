//! Integration tests for the shopping cart.

#![allow(clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::json;
use shoplane_integration_tests::{TestApp, assert_money, body};

async fn signed_in() -> TestApp {
    let app = TestApp::spawn().await;
    let resp = app.register("Asha Rao", "asha@example.com").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    app
}

#[tokio::test]
async fn test_cart_requires_session() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/api/cart").await.status(), StatusCode::UNAUTHORIZED);
    let resp = app
        .post("/api/cart/add", &json!({ "productId": 1, "quantity": 1 }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_new_cart_is_empty() {
    let app = signed_in().await;

    let cart = body(app.get("/api/cart").await).await;
    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["savedForLater"], json!([]));
    assert_money(&cart["totals"]["total"], 0.0);
    assert_money(&cart["totals"]["shipping"], 0.0);
}

#[tokio::test]
async fn test_add_prices_from_catalog() {
    let app = signed_in().await;

    // Client-supplied prices are ignored.
    let resp = app
        .post(
            "/api/cart/add",
            &json!({ "productId": 1, "quantity": 2, "price": 0.01 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body(resp).await;
    assert_eq!(json["message"], "Item added to cart");

    let cart = &json["cart"];
    assert_eq!(cart["items"][0]["productId"], 1);
    assert_eq!(cart["items"][0]["title"], "Wireless Earbuds");
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_money(&cart["items"][0]["price"], 10.0);

    // 20.00 + 5.99 shipping + 1.60 tax
    assert_eq!(cart["totals"]["itemCount"], 2);
    assert_money(&cart["totals"]["subtotal"], 20.0);
    assert_money(&cart["totals"]["shipping"], 5.99);
    assert_money(&cart["totals"]["tax"], 1.6);
    assert_money(&cart["totals"]["total"], 27.59);

    // Adding again accumulates.
    let json = body(app.post("/api/cart/add", &json!({ "productId": 1 })).await).await;
    assert_eq!(json["cart"]["items"][0]["quantity"], 3);
}

#[tokio::test]
async fn test_add_rejects_unavailable_products() {
    let app = signed_in().await;

    let resp = app.post("/api/cart/add", &json!({ "productId": 3 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(resp).await["message"], "Brass Desk Lamp is out of stock");

    let resp = app.post("/api/cart/add", &json!({ "productId": 999 })).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .post("/api/cart/add", &json!({ "productId": 1, "quantity": 1000 }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(resp).await["details"][0]["message"],
        "Quantity must be between 1 and 999"
    );
}

#[tokio::test]
async fn test_update_quantity_crosses_free_shipping() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 1, "quantity": 2 }))
        .await;

    let resp = app
        .put("/api/cart/update/1", &json!({ "quantity": 5 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body(resp).await;
    assert_eq!(json["message"], "Cart updated");
    assert_money(&json["cart"]["totals"]["subtotal"], 50.0);
    assert_money(&json["cart"]["totals"]["shipping"], 0.0);
    assert_money(&json["cart"]["totals"]["tax"], 4.0);
    assert_money(&json["cart"]["totals"]["total"], 54.0);

    let resp = app.put("/api/cart/update/4", &json!({ "quantity": 1 })).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(resp).await["message"], "Item not found in cart");

    let resp = app.put("/api/cart/update/1", &json!({ "quantity": 0 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.put("/api/cart/update/1", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_save_for_later_round_trip() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 2 })).await;
    app.post("/api/cart/add", &json!({ "productId": 1 })).await;

    let json = body(app.post("/api/cart/save-for-later/2", &json!({})).await).await;
    let cart = &json["cart"];
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["savedForLater"][0]["productId"], 2);
    // Saved lines do not count towards the totals.
    assert_money(&cart["totals"]["subtotal"], 10.0);

    let json = body(app.post("/api/cart/move-to-cart/2", &json!({})).await).await;
    assert_eq!(json["cart"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["cart"]["savedForLater"], json!([]));

    let resp = app.post("/api/cart/move-to-cart/2", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_and_clear() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 1 })).await;
    app.post("/api/cart/add", &json!({ "productId": 4 })).await;

    let json = body(app.delete("/api/cart/remove/1").await).await;
    assert_eq!(json["message"], "Item removed from cart");
    assert_eq!(json["cart"]["items"][0]["productId"], 4);

    let resp = app.delete("/api/cart/remove/1").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let json = body(app.delete("/api/cart/clear").await).await;
    assert_eq!(json["message"], "Cart cleared");
    assert_eq!(json["cart"]["items"], json!([]));
}

#[tokio::test]
async fn test_merge_guest_cart() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 1, "quantity": 1 }))
        .await;

    let resp = app
        .post(
            "/api/cart/merge",
            &json!({ "items": [
                { "productId": 1, "quantity": 2 },
                { "productId": 999, "quantity": 1 },
                { "productId": 3, "quantity": 1 },
                { "productId": 4 }
            ] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body(resp).await;
    assert_eq!(json["merged"], 2);
    assert_eq!(json["skipped"], json!([999, 3]));

    let items = json["cart"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(items[1]["productId"], 4);
}

#[tokio::test]
async fn test_carts_are_per_user() {
    let app = signed_in().await;
    app.post("/api/cart/add", &json!({ "productId": 1 })).await;

    let other = app.other_client();
    other
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "name": "Ben Okafor",
            "email": "ben@example.com",
            "password": shoplane_integration_tests::PASSWORD
        }))
        .send()
        .await
        .expect("register");
    let cart = other
        .get(app.url("/api/cart"))
        .send()
        .await
        .expect("cart")
        .json::<serde_json::Value>()
        .await
        .expect("json");
    assert_eq!(cart["items"], json!([]));
}
