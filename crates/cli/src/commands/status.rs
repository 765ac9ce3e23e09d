//! Outbox delivery status.

use tracing::{info, warn};

use food_delivery_server::db::{OutboxStore, PgStore};

/// Log how many order events are pending, delivered and dead.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = PgStore::new(super::connect().await?);
    let counts = store.outbox_counts().await?;

    info!(
        pending = counts.pending,
        delivered = counts.delivered,
        dead = counts.dead,
        "Outbox status"
    );
    if counts.dead > 0 {
        warn!(
            dead = counts.dead,
            "Some order events were never delivered; see order_events.last_error"
        );
    }

    Ok(())
}
