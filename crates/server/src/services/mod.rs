//! Business logic for the order service.
//!
//! # Services
//!
//! - `auth` - Registration, login and bearer tokens
//! - `catalog` - Restaurant and menu browsing
//! - `orders` - Checkout, order lookup and the status lifecycle
//! - `notifier` - HTTP client for the internal communication service
//! - `outbox` - Background delivery of order-created events

pub mod auth;
pub mod catalog;
pub mod notifier;
pub mod orders;
pub mod outbox;
