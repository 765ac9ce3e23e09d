//! Outbox events.
//!
//! Every order insert writes an [`OrderEvent`] in the same transaction. The
//! outbox dispatcher later delivers the payload to the internal
//! communication service and records the outcome on the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use food_delivery_core::{EventId, EventState, OrderId, RestaurantId};

/// Event type written for every new order.
pub const ORDER_CREATED: &str = "ORDER_CREATED";

/// Body posted to `/events/order-created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedPayload {
    pub order_id: OrderId,
    pub restaurant_id: RestaurantId,
}

/// A persisted notification awaiting (or done with) delivery.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub id: EventId,
    pub event_type: String,
    pub order_id: OrderId,
    pub restaurant_id: RestaurantId,
    pub payload: serde_json::Value,
    pub state: EventState,
    /// Failed delivery attempts so far.
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Number of outbox events in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxCounts {
    pub pending: i64,
    pub delivered: i64,
    pub dead: i64,
}
