//! `PgStore` tests.
//!
//! These tests require:
//! - A `PostgreSQL` database reachable at `DATABASE_URL` (migrations are
//!   applied automatically)
//!
//! Run with: `cargo test -p food-delivery-integration-tests -- --ignored`
//!
//! Tests share one database, so every account is unique per run and each
//! test holds [`DB_LOCK`] so outbox claims and row counts stay its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{Mutex, Notify};

use food_delivery_core::{
    Email, EventState, MenuItemId, OrderId, OrderStatus, PaymentStatus, Price, RestaurantId,
    UserId, Username,
};
use food_delivery_integration_tests::{TestApp, postgres_store, unique_account};
use food_delivery_server::db::{
    CatalogStore, OrderStore, OutboxStore, PgStore, RepositoryError, Store, UserStore,
};
use food_delivery_server::models::{LineItem, NewOrder, NewUser, OrderEvent};
use food_delivery_server::seed::{self, CatalogSeed};
use food_delivery_server::services::orders::{CreateOrder, OrderError, OrderLine, OrderService};

static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn seeded() -> PgStore {
    let store = postgres_store().await;
    seed::apply(&store, &CatalogSeed::embedded().expect("embedded catalog"))
        .await
        .expect("seed database");
    store
}

fn account(email: &str, username: &str) -> NewUser {
    NewUser {
        email: Email::parse(email).expect("email"),
        username: Username::parse(username).expect("username"),
        password_hash: "not-a-real-hash".to_string(),
        full_name: None,
        phone: None,
    }
}

async fn new_user(store: &PgStore) -> UserId {
    let (email, username) = unique_account();
    store
        .create_user(account(&email, &username))
        .await
        .expect("create user")
        .id
}

async fn event_count(store: &PgStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM order_events")
        .fetch_one(store.pool())
        .await
        .expect("count events")
}

fn butter_chicken_order(user_id: UserId) -> NewOrder {
    NewOrder {
        user_id,
        restaurant_id: RestaurantId::new(1),
        restaurant_name: "Spice Garden".to_string(),
        items: vec![LineItem {
            menu_item_id: MenuItemId::new(101),
            name: "Butter Chicken".to_string(),
            quantity: 2,
            price: Price::from_units(350),
        }],
        total_amount: Price::from_units(700),
        delivery_address: "Addr".to_string(),
    }
}

/// Claim due events until the one for `order_id` turns up.
async fn claim_event_for(store: &PgStore, order_id: OrderId) -> Option<OrderEvent> {
    loop {
        let batch = store
            .claim_due_events(100, Duration::from_secs(60))
            .await
            .expect("claim");
        if batch.is_empty() {
            return None;
        }
        if let Some(event) = batch.into_iter().find(|e| e.order_id == order_id) {
            return Some(event);
        }
    }
}

async fn event_state(store: &PgStore, order_id: OrderId) -> (EventState, i32) {
    sqlx::query_as("SELECT state, attempts FROM order_events WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(store.pool())
        .await
        .expect("event row")
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_seeding_is_idempotent() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    store.ping().await.expect("ping");

    let report = seed::apply(&store, &CatalogSeed::embedded().expect("embedded catalog"))
        .await
        .expect("reseed");
    assert_eq!(report.restaurants, 0);
    assert!(!report.demo_user);

    let menu = store
        .list_available_menu(RestaurantId::new(1))
        .await
        .expect("menu");
    let butter_chicken = menu
        .iter()
        .find(|i| i.id == MenuItemId::new(101))
        .expect("item 101");
    assert_eq!(butter_chicken.price, Price::from_units(350));
    assert!(menu.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_unique_violations_become_conflicts() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    let (email, username) = unique_account();

    store
        .create_user(account(&email, &username))
        .await
        .expect("first insert");

    let (other_email, other_username) = unique_account();
    let err = store
        .create_user(account(&email.to_uppercase(), &other_username))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("email")), "{err:?}");

    let err = store
        .create_user(account(&other_email, &username.to_uppercase()))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("username")), "{err:?}");

    assert!(
        store
            .username_taken(&Username::parse(&username.to_uppercase()).expect("username"))
            .await
            .expect("username_taken")
    );
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_order_and_event_are_written_together() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    let user_id = new_user(&store).await;

    let order = store
        .create_order(butter_chicken_order(user_id))
        .await
        .expect("create order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.total_amount, Price::from_units(700));

    let (state, attempts) = event_state(&store, order.id).await;
    assert_eq!(state, EventState::Pending);
    assert_eq!(attempts, 0);

    // A failing insert leaves no event behind
    let before = event_count(&store).await;
    let mut orphan = butter_chicken_order(user_id);
    orphan.user_id = UserId::new(i32::MAX);
    assert!(store.create_order(orphan).await.is_err());
    assert_eq!(event_count(&store).await, before);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_orders_list_newest_first() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    let user_id = new_user(&store).await;

    let first = store.create_order(butter_chicken_order(user_id)).await.expect("first");
    let second = store.create_order(butter_chicken_order(user_id)).await.expect("second");

    let listed = store.list_orders_for_user(user_id).await.expect("list");
    let ids: Vec<_> = listed.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_status_compare_and_set() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    let user_id = new_user(&store).await;
    let order = store.create_order(butter_chicken_order(user_id)).await.expect("order");

    let confirmed = store
        .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
        .await
        .expect("update")
        .expect("row matched");
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.updated_at >= order.updated_at);
    assert_eq!(confirmed.total_amount, order.total_amount);

    // The second writer still expects PENDING and loses
    let lost = store
        .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
        .await
        .expect("update");
    assert!(lost.is_none());

    let paid = store
        .update_payment_status(order.id, PaymentStatus::Paid)
        .await
        .expect("update")
        .expect("row matched");
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatus::Confirmed);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_service_rejects_oversized_quantity_before_insert() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    let user_id = new_user(&store).await;
    let wake = Notify::new();
    let orders = OrderService::new(&store, &wake);

    let err = orders
        .create_order(
            user_id,
            CreateOrder {
                restaurant_id: RestaurantId::new(1),
                items: vec![OrderLine {
                    menu_item_id: MenuItemId::new(101),
                    quantity: 4_000_000_000,
                }],
                total_amount: None,
                delivery_address: "Addr".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidQuantity(_)), "{err:?}");
    assert!(store.list_orders_for_user(user_id).await.expect("list").is_empty());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_outbox_claim_retry_and_dead() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;
    let user_id = new_user(&store).await;
    let order = store.create_order(butter_chicken_order(user_id)).await.expect("order");

    let event = claim_event_for(&store, order.id).await.expect("event claimed");
    assert_eq!(event.restaurant_id, RestaurantId::new(1));
    assert_eq!(event.payload, json!({ "orderId": order.id, "restaurantId": 1 }));
    assert!(event.next_attempt_at > Utc::now());

    // Leased: not claimable again until the lease runs out
    assert!(claim_event_for(&store, order.id).await.is_none());

    store
        .mark_failed(event.id, "connection refused", Some(Utc::now()))
        .await
        .expect("mark failed");
    assert_eq!(event_state(&store, order.id).await, (EventState::Pending, 1));

    let retried = claim_event_for(&store, order.id).await.expect("due again");
    assert_eq!(retried.attempts, 1);
    assert_eq!(retried.last_error.as_deref(), Some("connection refused"));

    store
        .mark_failed(retried.id, "gave up", None)
        .await
        .expect("mark dead");
    assert_eq!(event_state(&store, order.id).await, (EventState::Dead, 2));
    assert!(store.outbox_counts().await.expect("counts").dead >= 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_http_flow_delivers_notification() {
    let _guard = DB_LOCK.lock().await;
    let store: Arc<dyn Store> = Arc::new(seeded().await);
    let app = TestApp::spawn_on(store).await;

    let (email, username) = unique_account();
    let token = app.register(&email, &username).await;
    let order = app.place_butter_chicken_order(&token).await;
    assert_eq!(order["status"], "PENDING");

    let shown = app
        .get_authed(&format!("/orders/{}", order["id"]), &token)
        .await;
    assert_eq!(shown.status(), reqwest::StatusCode::OK);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let delivered = loop {
        let received = app.comm.received().await;
        if received.iter().any(|e| e["orderId"] == order["id"]) {
            break true;
        }
        if tokio::time::Instant::now() >= deadline {
            break false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(delivered, "order-created event never reached the comm service");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_menu_lookup_is_scoped_to_restaurant() {
    let _guard = DB_LOCK.lock().await;
    let store = seeded().await;

    let items = store
        .get_menu_items(
            RestaurantId::new(1),
            &[MenuItemId::new(101), MenuItemId::new(201), MenuItemId::new(999)],
        )
        .await
        .expect("menu items");
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![MenuItemId::new(101)]);

    assert!(
        store
            .get_restaurant(RestaurantId::new(424_242))
            .await
            .expect("lookup")
            .is_none()
    );
}
