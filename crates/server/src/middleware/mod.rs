//! HTTP middleware and request guards for the order service.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request span with method, URI, status, latency)
//! 3. Request ID (reuse or generate `x-request-id`)
//!
//! # Extractors
//!
//! - [`RequireAuth`] - bearer token for customer routes
//! - [`RequireInternal`] - `X-Internal-Token` for service-to-service routes

pub mod auth;
pub mod internal;
pub mod request_id;

pub use auth::RequireAuth;
pub use internal::{INTERNAL_TOKEN_HEADER, RequireInternal};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
