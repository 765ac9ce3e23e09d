//! End-to-end tests for the order service.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p food-delivery-integration-tests
//!
//! # Include the PostgreSQL-backed tests
//! DATABASE_URL=postgres://localhost/food_delivery_test \
//!     cargo test -p food-delivery-integration-tests -- --include-ignored
//! ```
//!
//! Each test spawns the full router on an ephemeral port, backed by a seeded
//! [`MemoryStore`], with the outbox dispatcher posting to a fake
//! communication service that records what it receives. Apart from the
//! `postgres` tests, no database or external service is needed.
//!
//! # Test Categories
//!
//! - `auth` - Registration, login and bearer tokens
//! - `catalog` - Restaurant and menu browsing
//! - `orders` - Checkout, lookup and ownership
//! - `internal` - Status updates behind `X-Internal-Token`
//! - `notifications` - Outbox delivery to the communication service
//! - `postgres` - The same flows against `PgStore` (`#[ignore]`d, needs
//!   `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use reqwest::{Client, Response};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify, watch};
use url::Url;
use uuid::Uuid;

use food_delivery_server::config::ServerConfig;
use food_delivery_server::db::{self, MemoryStore, PgStore, Store};
use food_delivery_server::seed::{self, CatalogSeed};
use food_delivery_server::services::notifier::NotificationClient;
use food_delivery_server::services::outbox::OutboxDispatcher;
use food_delivery_server::state::AppState;

/// Value the test server expects in `X-Internal-Token`.
pub const INTERNAL_TOKEN: &str = "integration-internal-token";

/// Demo account from the embedded catalog.
pub const DEMO_EMAIL: &str = "demo@fooddelivery.com";
pub const DEMO_PASSWORD: &str = "demo123";

const JWT_SECRET: &str = "integration-signing-secret-0123456789";

/// Stand-in for the internal communication service.
#[derive(Clone, Default)]
pub struct FakeCommService {
    received: Arc<Mutex<Vec<Value>>>,
    failing: Arc<std::sync::atomic::AtomicBool>,
}

impl FakeCommService {
    /// Bodies posted to `/events/order-created` so far.
    pub async fn received(&self) -> Vec<Value> {
        self.received.lock().await.clone()
    }

    /// Make the service answer 503 until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Poll until at least `count` events have arrived or `timeout` passes.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let received = self.received().await;
            if received.len() >= count || tokio::time::Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn spawn(&self) -> Url {
        async fn order_created(
            State(service): State<FakeCommService>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            if service.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return StatusCode::SERVICE_UNAVAILABLE;
            }
            service.received.lock().await.push(body);
            StatusCode::OK
        }

        let router = Router::new()
            .route("/events/order-created", post(order_created))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake comm service");
        let addr = listener.local_addr().expect("fake comm service address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Url::parse(&format!("http://{addr}/")).expect("fake comm service URL")
    }
}

/// A running order service plus its collaborators.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: Arc<dyn Store>,
    /// Set when the app runs on the in-memory backend.
    pub memory: Option<Arc<MemoryStore>>,
    pub comm: FakeCommService,
    _shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// Start a seeded in-memory order service with a fast outbox dispatcher.
    pub async fn spawn() -> Self {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Store> = memory.clone();
        let mut app = Self::spawn_on(store).await;
        app.memory = Some(memory);
        app
    }

    /// Start an order service over `store`, seeding it with the embedded
    /// catalog and demo user if they are missing.
    pub async fn spawn_on(store: Arc<dyn Store>) -> Self {
        let comm = FakeCommService::default();
        let comm_url = comm.spawn().await;

        let mut config = ServerConfig::in_memory(SecretString::from(JWT_SECRET));
        config.internal_api_token = Some(SecretString::from(INTERNAL_TOKEN));
        config.notifier.base_url = comm_url;
        config.notifier.timeout = Duration::from_millis(500);
        config.outbox.poll_interval = Duration::from_millis(50);
        config.outbox.backoff_base = Duration::from_millis(10);
        config.outbox.backoff_max = Duration::from_millis(50);
        config.outbox.max_attempts = 50;

        let catalog = CatalogSeed::embedded().expect("embedded catalog");
        seed::apply(store.as_ref(), &catalog)
            .await
            .expect("seed store");

        let outbox_wake = Arc::new(Notify::new());
        let notifier = NotificationClient::new(&config.notifier).expect("notification client");
        let dispatcher = OutboxDispatcher::new(
            Arc::clone(&store),
            notifier,
            config.outbox.clone(),
            Arc::clone(&outbox_wake),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(dispatcher.run(shutdown_rx));

        let state = AppState::new(config, Arc::clone(&store), outbox_wake);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind order service");
        let addr = listener.local_addr().expect("order service address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, food_delivery_server::app(state)).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            store,
            memory: None,
            comm,
            _shutdown: shutdown_tx,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET path` without credentials.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    /// `GET path` with a bearer token.
    pub async fn get_authed(&self, path: &str, token: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("authenticated GET request")
    }

    /// `POST path` with a JSON body.
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request")
    }

    /// `POST path` with a JSON body and a bearer token.
    pub async fn post_authed(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("authenticated POST request")
    }

    /// `PUT path` with a JSON body and the internal token.
    pub async fn put_internal(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .header("X-Internal-Token", INTERNAL_TOKEN)
            .json(body)
            .send()
            .await
            .expect("internal PUT request")
    }

    /// Register a fresh account and return its access token.
    pub async fn register(&self, email: &str, username: &str) -> String {
        let resp = self
            .post_json(
                "/auth/register",
                &json!({
                    "email": email,
                    "username": username,
                    "password": "hunter22",
                    "fullName": "Test User"
                }),
            )
            .await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        token_from(resp).await
    }

    /// Log in as the seeded demo user and return the access token.
    pub async fn login_demo(&self) -> String {
        let resp = self
            .post_json(
                "/auth/login",
                &json!({ "email": DEMO_EMAIL, "password": DEMO_PASSWORD }),
            )
            .await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        token_from(resp).await
    }

    /// Place the two-Butter-Chicken order at Spice Garden.
    pub async fn place_butter_chicken_order(&self, token: &str) -> Value {
        let resp = self
            .post_authed(
                "/orders",
                token,
                &json!({
                    "restaurantId": 1,
                    "items": [{ "menuItemId": 101, "quantity": 2 }],
                    "totalAmount": 700,
                    "deliveryAddress": "12 Residency Road, Bangalore"
                }),
            )
            .await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        resp.json().await.expect("order body")
    }
}

/// Connect to `DATABASE_URL` and apply the migrations.
///
/// Tests using this are `#[ignore]`d; run them with
/// `cargo test -p food-delivery-integration-tests -- --ignored`.
pub async fn postgres_store() -> PgStore {
    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .expect("DATABASE_URL must be set for database tests");
    let pool = db::create_pool(&database_url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("../server/migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    PgStore::new(pool)
}

/// An email and username no other test run has used.
#[must_use]
pub fn unique_account() -> (String, String) {
    let tag = Uuid::new_v4().simple().to_string();
    (format!("user-{tag}@example.com"), format!("u{tag}"))
}

async fn token_from(resp: Response) -> String {
    let body: Value = resp.json().await.expect("auth body");
    body["access_token"]
        .as_str()
        .expect("access_token in auth body")
        .to_string()
}
