//! Outbox dispatcher.
//!
//! Delivers `ORDER_CREATED` events written alongside each order. The
//! dispatcher runs as a background task: it wakes when an order is placed
//! and on a fixed poll interval, claims due events, and posts each one to
//! the internal communication service. Failed deliveries are retried with
//! exponential backoff until `max_attempts`, after which the event is dead.
//!
//! Delivery is at-least-once: an event whose delivery succeeded but could
//! not be marked is sent again once its claim lease runs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

use crate::config::OutboxConfig;
use crate::db::{RepositoryError, Store};
use crate::models::OrderEvent;
use crate::services::notifier::NotificationClient;

/// How long a claimed event is hidden from other claims.
const CLAIM_LEASE: Duration = Duration::from_secs(60);

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead: usize,
}

impl DispatchReport {
    /// Events handled in this pass.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.delivered + self.retried + self.dead
    }
}

/// Delay before retry number `attempts` (1-based): `base * 2^(attempts-1)`,
/// capped at `max`.
#[must_use]
pub fn backoff_delay(attempts: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(31);
    base.checked_mul(1_u32 << exponent)
        .map_or(max, |delay| delay.min(max))
}

/// Background task delivering outbox events.
pub struct OutboxDispatcher {
    store: Arc<dyn Store>,
    client: NotificationClient,
    config: OutboxConfig,
    wake: Arc<Notify>,
}

impl OutboxDispatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        client: NotificationClient,
        config: OutboxConfig,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            store,
            client,
            config,
            wake,
        }
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            endpoint = %self.client.order_created_url(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Outbox dispatcher started"
        );

        loop {
            match self.dispatch_due().await {
                Ok(report) if report.total() > 0 => {
                    debug!(
                        delivered = report.delivered,
                        retried = report.retried,
                        dead = report.dead,
                        "Outbox pass finished"
                    );
                    // A full batch may mean more are waiting
                    if report.total() >= self.batch_len() {
                        continue;
                    }
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Outbox pass failed"),
            }

            tokio::select! {
                () = self.wake.notified() => {}
                () = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Outbox dispatcher stopped");
    }

    fn batch_len(&self) -> usize {
        usize::try_from(self.config.batch_size).unwrap_or(usize::MAX)
    }

    /// Claim and deliver one batch of due events.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if claiming or recording an outcome fails.
    pub async fn dispatch_due(&self) -> Result<DispatchReport, RepositoryError> {
        let events = self
            .store
            .claim_due_events(self.config.batch_size, CLAIM_LEASE)
            .await?;

        let mut report = DispatchReport::default();
        for event in events {
            self.deliver(&event, &mut report).await?;
        }
        Ok(report)
    }

    async fn deliver(
        &self,
        event: &OrderEvent,
        report: &mut DispatchReport,
    ) -> Result<(), RepositoryError> {
        let attempt = u32::try_from(event.attempts).unwrap_or(0).saturating_add(1);

        let Err(e) = self.client.notify_order_created(&event.payload).await else {
            self.store.mark_delivered(event.id).await?;
            info!(event_id = %event.id, order_id = %event.order_id, attempt, "Order event delivered");
            report.delivered += 1;
            return Ok(());
        };

        let message = e.to_string();
        if attempt >= self.config.max_attempts {
            self.store.mark_failed(event.id, &message, None).await?;
            error!(
                event_id = %event.id,
                order_id = %event.order_id,
                attempt,
                error = %message,
                "Order event delivery abandoned"
            );
            report.dead += 1;
            return Ok(());
        }

        let delay = backoff_delay(attempt, self.config.backoff_base, self.config.backoff_max);
        let retry_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .unwrap_or_else(Utc::now);
        self.store
            .mark_failed(event.id, &message, Some(retry_at))
            .await?;
        warn!(
            event_id = %event.id,
            order_id = %event.order_id,
            attempt,
            retry_in_secs = delay.as_secs(),
            error = %message,
            "Order event delivery failed"
        );
        report.retried += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use url::Url;

    use super::*;
    use crate::config::NotifierConfig;
    use crate::db::{MemoryStore, OrderStore, OutboxStore};
    use crate::models::{LineItem, NewOrder};
    use food_delivery_core::{MenuItemId, Price, RestaurantId, UserId};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(300);
        assert_eq!(backoff_delay(1, base, max), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, base, max), Duration::from_secs(4));
        assert_eq!(backoff_delay(5, base, max), Duration::from_secs(32));
        assert_eq!(backoff_delay(9, base, max), max);
        assert_eq!(backoff_delay(u32::MAX, base, max), max);
    }

    async fn store_with_order() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_order(NewOrder {
                user_id: UserId::new(1),
                restaurant_id: RestaurantId::new(1),
                restaurant_name: "Spice Garden".to_string(),
                items: vec![LineItem {
                    menu_item_id: MenuItemId::new(101),
                    name: "Butter Chicken".to_string(),
                    quantity: 2,
                    price: Price::from_units(350),
                }],
                total_amount: Price::from_units(700),
                delivery_address: "Addr".to_string(),
            })
            .await
            .unwrap();
        store
    }

    fn dispatcher(store: Arc<MemoryStore>, base_url: &str, max_attempts: u32) -> OutboxDispatcher {
        let client = NotificationClient::new(&NotifierConfig {
            base_url: Url::parse(base_url).unwrap(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();
        let config = OutboxConfig {
            max_attempts,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            ..OutboxConfig::default()
        };
        OutboxDispatcher::new(store, client, config, Arc::new(Notify::new()))
    }

    async fn fake_comm_service(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/events/order-created",
                post(
                    |State((hits, status)): State<(Arc<AtomicUsize>, StatusCode)>,
                     Json(body): Json<serde_json::Value>| async move {
                        assert_eq!(body["orderId"], 1);
                        assert_eq!(body["restaurantId"], 1);
                        hits.fetch_add(1, Ordering::SeqCst);
                        status
                    },
                ),
            )
            .with_state((Arc::clone(&hits), status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn test_delivers_on_success() {
        let store = store_with_order().await;
        let (url, hits) = fake_comm_service(StatusCode::OK).await;
        let dispatcher = dispatcher(Arc::clone(&store), &url, 3);

        let report = dispatcher.dispatch_due().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let counts = store.outbox_counts().await.unwrap();
        assert_eq!((counts.pending, counts.delivered), (0, 1));

        // Nothing left to send
        assert_eq!(dispatcher.dispatch_due().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_retries_then_gives_up() {
        let store = store_with_order().await;
        let (url, hits) = fake_comm_service(StatusCode::SERVICE_UNAVAILABLE).await;
        let dispatcher = dispatcher(Arc::clone(&store), &url, 2);

        let first = dispatcher.dispatch_due().await.unwrap();
        assert_eq!(first.retried, 1);
        assert_eq!(store.outbox_counts().await.unwrap().pending, 1);

        let second = dispatcher.dispatch_due().await.unwrap();
        assert_eq!(second.dead, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let counts = store.outbox_counts().await.unwrap();
        assert_eq!((counts.pending, counts.dead), (0, 1));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_retried() {
        let store = store_with_order().await;
        let dispatcher = dispatcher(Arc::clone(&store), "http://127.0.0.1:1", 5);

        let report = dispatcher.dispatch_due().await.unwrap();
        assert_eq!(report.retried, 1);

        let counts = store.outbox_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = store_with_order().await;
        let (url, hits) = fake_comm_service(StatusCode::OK).await;
        let dispatcher = dispatcher(Arc::clone(&store), &url, 3);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(dispatcher.run(rx));

        for _ in 0..50 {
            if hits.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.outbox_counts().await.unwrap().delivered, 1);
    }
}
