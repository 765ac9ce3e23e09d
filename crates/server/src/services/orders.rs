//! Order placement and lifecycle.
//!
//! Checkout prices every line from the menu, never from the client, and
//! writes the order together with its `ORDER_CREATED` outbox event. Status
//! changes follow [`OrderStatus::next_states`] and are applied with a
//! compare-and-set, so two concurrent transitions cannot both win.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use food_delivery_core::{
    MenuItemId, OrderId, OrderStatus, PaymentStatus, Price, RestaurantId, UserId,
};

use crate::db::{RepositoryError, Store};
use crate::models::{LineItem, NewOrder, Order};

/// Largest allowed gap between a declared total and the computed one.
const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Most units of one menu item a single line may order.
pub const MAX_QUANTITY: u32 = 1000;

/// Largest order total the `orders.total_amount` column (`NUMERIC(12,2)`)
/// can hold: 9,999,999,999.99.
pub const MAX_TOTAL: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Errors that can occur while placing or updating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Restaurant not found")]
    RestaurantNotFound,

    #[error("Restaurant is currently closed")]
    RestaurantClosed,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Menu item {0} not found at this restaurant")]
    MenuItemNotFound(MenuItemId),

    #[error("Menu item {0} is not available")]
    MenuItemUnavailable(MenuItemId),

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Quantity for menu item {0} must be between 1 and {max}", max = MAX_QUANTITY)]
    InvalidQuantity(MenuItemId),

    #[error("Delivery address is required")]
    BlankAddress,

    #[error("Order total is too large")]
    TotalOverflow,

    #[error("Declared total {declared} does not match computed total {computed}")]
    TotalMismatch { declared: Price, computed: Price },

    #[error("Cannot change order status from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One requested line. Clients may also send a `price`; it is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
}

/// A checkout request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub restaurant_id: RestaurantId,
    pub items: Vec<OrderLine>,
    /// Total as the client computed it; checked against the menu prices.
    #[serde(default)]
    pub total_amount: Option<Price>,
    pub delivery_address: String,
}

/// Order placement, lookup and status changes.
pub struct OrderService<'a> {
    store: &'a dyn Store,
    outbox_wake: &'a Notify,
}

impl<'a> OrderService<'a> {
    /// `outbox_wake` is signalled after each order so the dispatcher picks
    /// up the new event without waiting for its next poll.
    #[must_use]
    pub const fn new(store: &'a dyn Store, outbox_wake: &'a Notify) -> Self {
        Self { store, outbox_wake }
    }

    /// Validate, price and persist an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::RestaurantNotFound` for an unknown restaurant,
    /// `OrderError::RestaurantClosed` if it is closed, and one of the
    /// validation variants if an item, quantity, address or total is
    /// unacceptable. Nothing is persisted on error.
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: CreateOrder,
    ) -> Result<Order, OrderError> {
        let delivery_address = request.delivery_address.trim().to_string();
        if delivery_address.is_empty() {
            return Err(OrderError::BlankAddress);
        }
        if request.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let restaurant = self
            .store
            .get_restaurant(request.restaurant_id)
            .await?
            .ok_or(OrderError::RestaurantNotFound)?;
        if !restaurant.is_open {
            return Err(OrderError::RestaurantClosed);
        }

        let ids: Vec<MenuItemId> = request.items.iter().map(|l| l.menu_item_id).collect();
        let menu: HashMap<MenuItemId, _> = self
            .store
            .get_menu_items(restaurant.id, &ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut items = Vec::with_capacity(request.items.len());
        let mut total = Price::ZERO;
        for line in &request.items {
            let quantity = u32::try_from(line.quantity)
                .ok()
                .filter(|q| (1..=MAX_QUANTITY).contains(q))
                .ok_or(OrderError::InvalidQuantity(line.menu_item_id))?;
            let item = menu
                .get(&line.menu_item_id)
                .ok_or(OrderError::MenuItemNotFound(line.menu_item_id))?;
            if !item.is_available {
                return Err(OrderError::MenuItemUnavailable(item.id));
            }

            total = item
                .price
                .times(quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .map_err(|_| OrderError::TotalOverflow)?;
            if total.amount() > MAX_TOTAL {
                return Err(OrderError::TotalOverflow);
            }
            items.push(LineItem {
                menu_item_id: item.id,
                name: item.name.clone(),
                quantity,
                price: item.price,
            });
        }

        if let Some(declared) = request.total_amount
            && declared.differs_from(&total, TOTAL_TOLERANCE)
        {
            return Err(OrderError::TotalMismatch {
                declared,
                computed: total,
            });
        }

        let order = self
            .store
            .create_order(NewOrder {
                user_id,
                restaurant_id: restaurant.id,
                restaurant_name: restaurant.name,
                items,
                total_amount: total,
                delivery_address,
            })
            .await?;

        self.outbox_wake.notify_one();
        info!(
            order_id = %order.id,
            user_id = %user_id,
            restaurant_id = %order.restaurant_id,
            total = %order.total_amount,
            "Order created"
        );

        Ok(order)
    }

    /// An order, if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if the order does not exist or
    /// belongs to someone else.
    pub async fn get_order(&self, id: OrderId, user_id: UserId) -> Result<Order, OrderError> {
        match self.store.get_order(id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            Some(_) => {
                debug!(order_id = %id, user_id = %user_id, "Order owned by another user");
                Err(OrderError::OrderNotFound)
            }
            None => Err(OrderError::OrderNotFound),
        }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if storage fails.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders_for_user(user_id).await?)
    }

    /// Move an order to `next`.
    ///
    /// Setting the current status again is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if the order does not exist and
    /// `OrderError::IllegalTransition` if the move is not allowed or another
    /// update got there first.
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let current = self
            .store
            .get_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        if current.status == next {
            return Ok(current);
        }
        if !current.status.can_transition_to(next) {
            return Err(OrderError::IllegalTransition {
                from: current.status,
                to: next,
            });
        }

        let Some(updated) = self
            .store
            .update_order_status(id, current.status, next)
            .await?
        else {
            warn!(order_id = %id, from = %current.status, to = %next, "Concurrent status update");
            return Err(OrderError::IllegalTransition {
                from: current.status,
                to: next,
            });
        };

        info!(order_id = %id, from = %current.status, to = %next, "Order status updated");
        Ok(updated)
    }

    /// Overwrite an order's payment status. Order status is untouched.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if the order does not exist.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .update_payment_status(id, payment_status)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        info!(order_id = %id, payment_status = %payment_status, "Payment status updated");
        Ok(order)
    }
}
