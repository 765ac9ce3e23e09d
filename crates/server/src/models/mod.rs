//! Domain models for the order service.
//!
//! These are the shapes handlers return and storage backends produce. JSON
//! field names are camelCase to match the web frontend.

pub mod catalog;
pub mod event;
pub mod order;
pub mod user;

pub use catalog::{MenuItem, Restaurant};
pub use event::{ORDER_CREATED, OrderCreatedPayload, OrderEvent, OutboxCounts};
pub use order::{LineItem, NewOrder, Order};
pub use user::{NewUser, User};
