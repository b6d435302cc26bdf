//! Integration tests for saved addresses and the wishlist.

#![allow(clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};
use shoplane_integration_tests::{TestApp, body};

fn address(city: &str) -> Value {
    json!({
        "name": "Asha Rao",
        "street": "12 MG Road",
        "city": city,
        "state": "KA",
        "postalCode": "560001"
    })
}

async fn signed_in() -> TestApp {
    let app = TestApp::spawn().await;
    let resp = app.register("Asha Rao", "asha@example.com").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    app
}

#[tokio::test]
async fn test_account_requires_session() {
    let app = TestApp::spawn().await;

    for path in ["/api/account/addresses", "/api/account/wishlist"] {
        assert_eq!(app.get(path).await.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_address_book() {
    let app = signed_in().await;

    let resp = app.post("/api/account/addresses", &address("Bengaluru")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first = body(resp).await;
    assert_eq!(first["address"]["id"], 1);
    assert_eq!(first["address"]["isDefault"], true);
    assert_eq!(first["address"]["country"], "India");

    let mut second = address("Mysuru");
    second["isDefault"] = json!(true);
    let json = body(app.post("/api/account/addresses", &second).await).await;
    assert_eq!(json["address"]["id"], 2);
    let defaults: Vec<i64> = json["addresses"]
        .as_array()
        .expect("addresses")
        .iter()
        .filter(|a| a["isDefault"] == true)
        .filter_map(|a| a["id"].as_i64())
        .collect();
    assert_eq!(defaults, vec![2]);

    let resp = app
        .put("/api/account/addresses/1", &address("Hubballi"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["address"]["city"], "Hubballi");

    // Removing the default promotes the first remaining address.
    let json = body(app.delete("/api/account/addresses/2").await).await;
    assert_eq!(json["addresses"][0]["id"], 1);
    assert_eq!(json["addresses"][0]["isDefault"], true);

    let me = body(app.get("/api/auth/me").await).await;
    assert_eq!(me["user"]["addresses"].as_array().map(Vec::len), Some(1));

    let resp = app.delete("/api/account/addresses/2").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_address_validation() {
    let app = signed_in().await;

    let resp = app
        .post(
            "/api/account/addresses",
            &json!({ "name": "Asha Rao", "phone": "call me" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let fields: Vec<String> = body(resp).await["details"]
        .as_array()
        .expect("details")
        .iter()
        .filter_map(|d| d["field"].as_str().map(str::to_owned))
        .collect();
    assert!(fields.contains(&"street".to_owned()));
    assert!(fields.contains(&"phone".to_owned()));
}

#[tokio::test]
async fn test_wishlist() {
    let app = signed_in().await;

    let json = body(
        app.post("/api/account/wishlist", &json!({ "productId": 2 }))
            .await,
    )
    .await;
    assert_eq!(json["message"], "Added to wishlist");
    assert_eq!(json["wishlist"], json!([2]));

    // Adding twice keeps one entry.
    let json = body(
        app.post("/api/account/wishlist", &json!({ "productId": 2 }))
            .await,
    )
    .await;
    assert_eq!(json["wishlist"], json!([2]));

    let resp = app
        .post("/api/account/wishlist", &json!({ "productId": 999 }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let json = body(app.get("/api/account/wishlist").await).await;
    assert_eq!(json["wishlist"][0]["title"], "Trail Backpack");

    let json = body(app.delete("/api/account/wishlist/2").await).await;
    assert_eq!(json["wishlist"], json!([]));

    let resp = app.delete("/api/account/wishlist/2").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
