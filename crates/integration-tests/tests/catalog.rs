//! Restaurant and menu browsing tests.

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;

use food_delivery_core::RestaurantId;
use food_delivery_integration_tests::TestApp;
use food_delivery_server::db::CatalogStore;

#[tokio::test]
async fn test_root_and_health() {
    let app = TestApp::spawn().await;

    let root: Value = app.get("/").await.json().await.expect("json body");
    assert_eq!(root["message"], "Order Service - Food Delivery System");
    assert_eq!(root["endpoints"]["orders"], "/orders");

    let health: Value = app.get("/health").await.json().await.expect("json body");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "order-service");

    let ready = app.get("/health/ready").await;
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_restaurants() {
    let app = TestApp::spawn().await;

    let resp = app.get("/restaurants").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: Vec<Value> = resp.json().await.expect("json body");
    assert_eq!(body.len(), 6);
    let spice_garden = body.iter().find(|r| r["id"] == 1).expect("restaurant 1");
    assert_eq!(spice_garden["name"], "Spice Garden");
    assert_eq!(spice_garden["deliveryTime"], "25-35 min");
    assert_eq!(spice_garden["isOpen"], true);
}

#[tokio::test]
async fn test_closed_restaurants_are_hidden_from_listing() {
    let app = TestApp::spawn().await;
    let memory = app.memory.as_ref().expect("in-memory backend");
    let mut closed = memory
        .get_restaurant(RestaurantId::new(2))
        .await
        .expect("store")
        .expect("restaurant 2");
    closed.is_open = false;
    closed.created_at = Utc::now();
    memory.upsert_restaurant(closed).await;

    let body: Vec<Value> = app.get("/restaurants").await.json().await.expect("json body");
    assert_eq!(body.len(), 5);
    assert!(body.iter().all(|r| r["id"] != 2));

    let detail = app.get("/restaurants/2").await;
    assert_eq!(detail.status(), StatusCode::OK);
    let detail: Value = detail.json().await.expect("json body");
    assert_eq!(detail["isOpen"], false);
}

#[tokio::test]
async fn test_restaurant_detail_and_menu() {
    let app = TestApp::spawn().await;

    let detail: Value = app.get("/restaurants/1").await.json().await.expect("json body");
    assert_eq!(detail["cuisine"], "North Indian");

    let menu: Vec<Value> = app
        .get("/restaurants/1/menu")
        .await
        .json()
        .await
        .expect("json body");
    assert_eq!(menu.len(), 5);
    let butter_chicken = menu.iter().find(|i| i["id"] == 101).expect("item 101");
    assert_eq!(butter_chicken["name"], "Butter Chicken");
    assert_eq!(butter_chicken["price"], 350.0);
    assert_eq!(butter_chicken["restaurantId"], 1);
}

#[tokio::test]
async fn test_unknown_restaurant_is_not_found() {
    let app = TestApp::spawn().await;

    for path in ["/restaurants/999", "/restaurants/999/menu"] {
        let resp = app.get(path).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
        let body: Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Restaurant not found");
    }
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = TestApp::spawn().await;

    let resp = app.get("/restaurants/abc").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["detail"].is_string());
}
