//! Application state shared across handlers.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::auth::TokenKeys;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// storage backend, token keys and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    tokens: TokenKeys,
    outbox_wake: Arc<Notify>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `outbox_wake` is shared with the outbox dispatcher; order creation
    /// signals it.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn Store>, outbox_wake: Arc<Notify>) -> Self {
        let tokens = TokenKeys::new(&config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                outbox_wake,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the token signing keys.
    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.inner.tokens
    }

    /// Get a reference to the outbox dispatcher wake handle.
    #[must_use]
    pub fn outbox_wake(&self) -> &Notify {
        &self.inner.outbox_wake
    }
}
