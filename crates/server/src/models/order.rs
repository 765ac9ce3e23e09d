//! Orders and their line items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use food_delivery_core::{
    MenuItemId, OrderId, OrderStatus, PaymentStatus, Price, RestaurantId, UserId,
};

/// One line of an order, snapshotted from the menu at checkout.
///
/// Stored as JSON inside the order row, so later menu edits never change
/// what a customer was charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub menu_item_id: MenuItemId,
    /// Dish name at purchase time.
    pub name: String,
    pub quantity: u32,
    /// Unit price at purchase time.
    pub price: Price,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    #[sqlx(json)]
    pub items: Vec<LineItem>,
    /// Sum of `price * quantity` over all items.
    pub total_amount: Price,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated, priced order ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub items: Vec<LineItem>,
    pub total_amount: Price,
    pub delivery_address: String,
}
