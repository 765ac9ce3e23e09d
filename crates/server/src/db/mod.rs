//! Storage for the order service.
//!
//! # Backends
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx (production)
//! - [`MemoryStore`] - process-local collections (development, tests)
//!
//! Both implement the same repository traits, so services and handlers only
//! ever see `dyn Store`.
//!
//! ## Tables
//!
//! - `users` - Accounts with argon2 password hashes
//! - `restaurants` - Restaurant listings
//! - `menu_items` - Dishes, cascade-deleted with their restaurant
//! - `orders` - Orders with JSONB line-item snapshots
//! - `order_events` - Outbox of order-created notifications
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p food-delivery-cli -- migrate
//! ```

pub mod catalog;
pub mod memory;
pub mod orders;
pub mod outbox;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use food_delivery_core::{
    Email, EventId, MenuItemId, OrderId, OrderStatus, PaymentStatus, RestaurantId, UserId,
    Username,
};

use crate::config::StorageConfig;
use crate::models::{
    MenuItem, NewOrder, NewUser, Order, OrderEvent, OutboxCounts, Restaurant, User,
};
use crate::seed::RestaurantSeed;

pub use memory::MemoryStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Open the configured storage backend.
///
/// The in-memory backend starts empty; callers seed it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the `PostgreSQL` pool cannot connect.
pub async fn connect(storage: &StorageConfig) -> Result<Arc<dyn Store>, RepositoryError> {
    match storage {
        StorageConfig::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StorageConfig::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user.
    ///
    /// Returns `RepositoryError::Conflict` naming the field if the email or
    /// username is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Look up a user by ID.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Look up a user and their password hash by email.
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Whether an account already uses this email.
    async fn email_taken(&self, email: &Email) -> Result<bool, RepositoryError>;

    /// Whether an account already uses this username.
    async fn username_taken(&self, username: &Username) -> Result<bool, RepositoryError>;
}

/// Restaurant and menu storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Open restaurants, ordered by ID.
    async fn list_open_restaurants(&self) -> Result<Vec<Restaurant>, RepositoryError>;

    /// Look up a restaurant by ID, open or not.
    async fn get_restaurant(&self, id: RestaurantId)
    -> Result<Option<Restaurant>, RepositoryError>;

    /// Available items on a restaurant's menu, ordered by ID.
    async fn list_available_menu(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<MenuItem>, RepositoryError>;

    /// Menu items of one restaurant with the given IDs, available or not.
    ///
    /// IDs that do not exist or belong to another restaurant are omitted.
    async fn get_menu_items(
        &self,
        restaurant_id: RestaurantId,
        ids: &[MenuItemId],
    ) -> Result<Vec<MenuItem>, RepositoryError>;

    /// Insert restaurants and their menus with their fixed IDs.
    ///
    /// Does nothing and returns 0 if any restaurant exists already; otherwise
    /// returns the number of restaurants inserted.
    async fn seed_catalog(&self, restaurants: &[RestaurantSeed]) -> Result<usize, RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order with status `PENDING` and its `ORDER_CREATED` outbox
    /// event, atomically.
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Look up an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Set the status if it is still `expected`.
    ///
    /// Returns `None` if the order does not exist or its status has moved on.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Overwrite the payment status. Returns `None` if the order does not exist.
    async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Outbox storage.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Claim up to `limit` pending events that are due, oldest first.
    ///
    /// Claimed events have their next attempt pushed out by `lease`, so a
    /// crashed dispatcher's claims become due again on their own.
    async fn claim_due_events(
        &self,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OrderEvent>, RepositoryError>;

    /// Mark an event delivered.
    async fn mark_delivered(&self, id: EventId) -> Result<(), RepositoryError>;

    /// Record a failed attempt.
    ///
    /// With `retry_at` the event stays pending until then; without it the
    /// event is marked dead.
    async fn mark_failed(
        &self,
        id: EventId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;

    /// Events per delivery state.
    async fn outbox_counts(&self) -> Result<OutboxCounts, RepositoryError>;
}

/// Everything the service needs from a storage backend.
#[async_trait]
pub trait Store: UserStore + CatalogStore + OrderStore + OutboxStore {
    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// `PostgreSQL`-backed store.
///
/// Queries are checked at runtime (`query_as` with `FromRow`).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique violation to `RepositoryError::Conflict`, naming the field
/// from the violated constraint.
pub(crate) fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let field = match db_err.constraint() {
            Some(c) if c.contains("username") => "username",
            Some(c) if c.contains("email") => "email",
            _ => "record",
        };
        return RepositoryError::Conflict(format!("{field} already exists"));
    }
    RepositoryError::Database(e)
}
