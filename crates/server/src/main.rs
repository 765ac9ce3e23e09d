//! Food Delivery order service.
//!
//! This binary serves the order API on port 8001 and runs the outbox
//! dispatcher that notifies the internal communication service of new
//! orders.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API
//! - `PostgreSQL` via sqlx, or in-memory storage for development
//! - HS256 bearer tokens, argon2 password hashes
//! - Transactional outbox for order-created notifications

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::{Notify, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use food_delivery_server::config::{LogFormat, ServerConfig, StorageConfig};
use food_delivery_server::services::notifier::NotificationClient;
use food_delivery_server::services::outbox::OutboxDispatcher;
use food_delivery_server::state::AppState;
use food_delivery_server::{app, db, seed};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the tracing subscriber: env filter, text or JSON output, Sentry.
fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "food_delivery_server=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let store = db::connect(&config.storage)
        .await
        .expect("Failed to open storage backend");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p food-delivery-cli -- migrate
    match &config.storage {
        StorageConfig::Postgres { .. } => tracing::info!("Database pool created"),
        StorageConfig::Memory => {
            let catalog = seed::CatalogSeed::embedded().expect("Embedded catalog is invalid");
            seed::apply(store.as_ref(), &catalog)
                .await
                .expect("Failed to seed in-memory store");
            tracing::warn!("Using in-memory storage; data is lost on restart");
        }
    }

    if config.internal_api_token.is_none() {
        tracing::warn!("INTERNAL_API_TOKEN is not set; internal order endpoints are open");
    }

    // Outbox dispatcher shares the wake handle with order creation
    let outbox_wake = Arc::new(Notify::new());
    let notifier =
        NotificationClient::new(&config.notifier).expect("Failed to build notification client");
    let dispatcher = OutboxDispatcher::new(
        Arc::clone(&store),
        notifier,
        config.outbox.clone(),
        Arc::clone(&outbox_wake),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_rx));

    let addr = config.socket_addr();
    let state = AppState::new(config, store, outbox_wake);

    // Start server
    tracing::info!("order service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_task.await {
        tracing::error!(error = %e, "Outbox dispatcher task failed");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
