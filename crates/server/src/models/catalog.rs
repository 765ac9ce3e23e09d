//! Restaurants and menu items.

use chrono::{DateTime, Utc};
use serde::Serialize;

use food_delivery_core::{MenuItemId, Price, RestaurantId};

/// A restaurant listed on the platform.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub cuisine: String,
    /// Average rating, 0.0 to 5.0.
    pub rating: f64,
    /// Free-text estimate such as "25-35 min".
    pub delivery_time: String,
    /// Image URL.
    pub image: String,
    /// Closed restaurants are hidden from listings and reject new orders.
    pub is_open: bool,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A dish on a restaurant's menu.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: MenuItemId,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub description: String,
    /// Current price; orders snapshot it at checkout.
    pub price: Price,
    pub category: String,
    /// Image URL or emoji.
    pub image: String,
    pub is_available: bool,
}
