//! Food Delivery Core - Shared types library.
//!
//! This crate provides common types used across all food delivery components:
//! - `server` - HTTP order service (restaurants, menus, orders, auth)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, usernames
//!   and the order/payment status enums with their transition rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
