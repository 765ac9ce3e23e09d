//! In-memory store for development and tests.
//!
//! All collections sit behind one async mutex, so every operation is
//! linearizable and the order + outbox insert is trivially atomic.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use food_delivery_core::{
    Email, EventId, EventState, MenuItemId, OrderId, OrderStatus, PaymentStatus, RestaurantId,
    UserId, Username,
};

use super::{CatalogStore, OrderStore, OutboxStore, RepositoryError, Store, UserStore};
use crate::models::{
    MenuItem, NewOrder, NewUser, ORDER_CREATED, Order, OrderCreatedPayload, OrderEvent,
    OutboxCounts, Restaurant, User,
};
use crate::seed::RestaurantSeed;

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, (User, String)>,
    restaurants: BTreeMap<RestaurantId, Restaurant>,
    menu_items: BTreeMap<MenuItemId, MenuItem>,
    orders: BTreeMap<OrderId, Order>,
    events: BTreeMap<EventId, OrderEvent>,
    last_user_id: i32,
    last_order_id: i32,
    last_event_id: i32,
}

impl Tables {
    const fn next_user_id(&mut self) -> UserId {
        self.last_user_id += 1;
        UserId::new(self.last_user_id)
    }

    const fn next_order_id(&mut self) -> OrderId {
        self.last_order_id += 1;
        OrderId::new(self.last_order_id)
    }

    const fn next_event_id(&mut self) -> EventId {
        self.last_event_id += 1;
        EventId::new(self.last_event_id)
    }
}

/// Process-local store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a restaurant or menu item wholesale.
    ///
    /// The HTTP API has no catalog write operations; this lets tests and
    /// tooling close a restaurant or pull a dish.
    pub async fn upsert_restaurant(&self, restaurant: Restaurant) {
        self.tables
            .lock()
            .await
            .restaurants
            .insert(restaurant.id, restaurant);
    }

    /// See [`MemoryStore::upsert_restaurant`].
    pub async fn upsert_menu_item(&self, item: MenuItem) {
        self.tables.lock().await.menu_items.insert(item.id, item);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        if tables
            .users
            .values()
            .any(|(u, _)| u.username.is_same_handle(&user.username))
        {
            return Err(RepositoryError::Conflict(
                "username already exists".to_owned(),
            ));
        }

        let created = User {
            id: tables.next_user_id(),
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            phone: user.phone,
            role: food_delivery_core::UserRole::default(),
            is_active: true,
            created_at: Utc::now(),
        };
        tables
            .users
            .insert(created.id, (created.clone(), user.password_hash));

        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).map(|(user, _)| user.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|(user, _)| &user.email == email)
            .cloned())
    }

    async fn email_taken(&self, email: &Email) -> Result<bool, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().any(|(user, _)| &user.email == email))
    }

    async fn username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .any(|(user, _)| user.username.is_same_handle(username)))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_open_restaurants(&self) -> Result<Vec<Restaurant>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .restaurants
            .values()
            .filter(|r| r.is_open)
            .cloned()
            .collect())
    }

    async fn get_restaurant(
        &self,
        id: RestaurantId,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.restaurants.get(&id).cloned())
    }

    async fn list_available_menu(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<MenuItem>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .menu_items
            .values()
            .filter(|item| item.restaurant_id == restaurant_id && item.is_available)
            .cloned()
            .collect())
    }

    async fn get_menu_items(
        &self,
        restaurant_id: RestaurantId,
        ids: &[MenuItemId],
    ) -> Result<Vec<MenuItem>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .menu_items
            .values()
            .filter(|item| item.restaurant_id == restaurant_id && ids.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn seed_catalog(&self, restaurants: &[RestaurantSeed]) -> Result<usize, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.restaurants.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        for seed in restaurants {
            tables.restaurants.insert(seed.id, seed.to_restaurant(now));
            for item in &seed.menu {
                tables.menu_items.insert(item.id, item.to_menu_item(seed.id));
            }
        }

        Ok(restaurants.len())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let created = Order {
            id: tables.next_order_id(),
            user_id: order.user_id,
            restaurant_id: order.restaurant_id,
            restaurant_name: order.restaurant_name,
            items: order.items,
            total_amount: order.total_amount,
            delivery_address: order.delivery_address,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let payload = serde_json::to_value(OrderCreatedPayload {
            order_id: created.id,
            restaurant_id: created.restaurant_id,
        })
        .map_err(|e| RepositoryError::DataCorruption(format!("unencodable event payload: {e}")))?;

        let event = OrderEvent {
            id: tables.next_event_id(),
            event_type: ORDER_CREATED.to_owned(),
            order_id: created.id,
            restaurant_id: created.restaurant_id,
            payload,
            state: EventState::Pending,
            attempts: 0,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            delivered_at: None,
        };

        tables.events.insert(event.id, event);
        tables.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.status != expected {
            return Ok(None);
        }

        order.status = next;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };

        order.payment_status = payment_status;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn claim_due_events(
        &self,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OrderEvent>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let lease_until = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|lease| now.checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut due: Vec<&mut OrderEvent> = tables
            .events
            .values_mut()
            .filter(|e| e.state == EventState::Pending && e.next_attempt_at <= now)
            .collect();
        due.sort_by_key(|e| (e.next_attempt_at, e.id));

        let claimed = due
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|event| {
                event.next_attempt_at = lease_until;
                event.clone()
            })
            .collect();

        Ok(claimed)
    }

    async fn mark_delivered(&self, id: EventId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let event = tables.events.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        event.state = EventState::Delivered;
        event.delivered_at = Some(Utc::now());
        event.last_error = None;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: EventId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let event = tables.events.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        event.attempts += 1;
        event.last_error = Some(error.to_owned());
        match retry_at {
            Some(at) => event.next_attempt_at = at,
            None => event.state = EventState::Dead,
        }
        Ok(())
    }

    async fn outbox_counts(&self) -> Result<OutboxCounts, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut counts = OutboxCounts::default();
        for event in tables.events.values() {
            match event.state {
                EventState::Pending => counts.pending += 1,
                EventState::Delivered => counts.delivered += 1,
                EventState::Dead => counts.dead += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use food_delivery_core::Price;

    use crate::models::LineItem;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: Email::parse(email).unwrap(),
            username: Username::parse(username).unwrap(),
            password_hash: "hash".to_owned(),
            full_name: None,
            phone: None,
        }
    }

    fn new_order(user_id: UserId) -> NewOrder {
        NewOrder {
            user_id,
            restaurant_id: RestaurantId::new(1),
            restaurant_name: "Spice Garden".to_owned(),
            items: vec![LineItem {
                menu_item_id: MenuItemId::new(101),
                name: "Butter Chicken".to_owned(),
                quantity: 2,
                price: Price::from_units(350),
            }],
            total_amount: Price::from_units(700),
            delivery_address: "Addr".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.com", "alice")).await.unwrap();

        let err = store
            .create_user(new_user("A@X.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("email")));

        let err = store
            .create_user(new_user("b@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("username")));
        let err = store
            .create_user(new_user("c@x.com", "ALICE"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m.contains("username")));
        assert!(
            store
                .username_taken(&Username::parse("Alice").unwrap())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_order_writes_outbox_event() {
        let store = MemoryStore::new();
        let order = store.create_order(new_order(UserId::new(1))).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        let counts = store.outbox_counts().await.unwrap();
        assert_eq!(counts.pending, 1);

        let events = store
            .claim_due_events(10, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, order.id);
        assert_eq!(events[0].payload["orderId"], order.id.as_i32());
    }

    #[tokio::test]
    async fn test_claim_leases_events() {
        let store = MemoryStore::new();
        store.create_order(new_order(UserId::new(1))).await.unwrap();

        let first = store
            .claim_due_events(10, Duration::from_secs(60))
            .await
            .unwrap();
        let second = store
            .claim_due_events(10, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let store = MemoryStore::new();
        let order = store.create_order(new_order(UserId::new(1))).await.unwrap();

        let updated = store
            .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, OrderStatus::Confirmed);

        // Stale expectation loses
        let stale = store
            .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_without_retry_is_dead() {
        let store = MemoryStore::new();
        store.create_order(new_order(UserId::new(1))).await.unwrap();
        let events = store
            .claim_due_events(1, Duration::from_secs(60))
            .await
            .unwrap();

        store
            .mark_failed(events[0].id, "connection refused", None)
            .await
            .unwrap();

        let counts = store.outbox_counts().await.unwrap();
        assert_eq!(counts, OutboxCounts { pending: 0, delivered: 0, dead: 1 });
    }
}
