//! HTTP route handlers for the order service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                            - Service index
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (store reachable)
//!
//! # Auth
//! POST /auth/register               - Create account, returns token
//! POST /auth/login                  - Exchange credentials for token
//! GET  /auth/me                     - Current user (bearer)
//!
//! # Catalog
//! GET  /restaurants                 - Open restaurants
//! GET  /restaurants/{id}            - Restaurant detail
//! GET  /restaurants/{id}/menu       - Available menu items
//!
//! # Orders (bearer)
//! POST /orders                      - Place an order
//! GET  /orders                      - Caller's orders, newest first
//! GET  /orders/{id}                 - Order detail (owner only)
//!
//! # Internal (X-Internal-Token)
//! PUT  /orders/{id}/status          - Advance order status
//! PUT  /orders/{id}/payment-status  - Set payment status
//! ```

pub mod auth;
pub mod health;
pub mod orders;
pub mod restaurants;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
}

/// Create the restaurant routes router.
pub fn restaurant_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(restaurants::index))
        .route("/{id}", get(restaurants::show))
        .route("/{id}/menu", get(restaurants::menu))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/payment-status", put(orders::update_payment_status))
}

/// Create all routes for the order service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/restaurants", restaurant_routes())
        .nest("/orders", order_routes())
}
