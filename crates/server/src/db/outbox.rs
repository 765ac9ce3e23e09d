//! Outbox repository for `PostgreSQL`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use food_delivery_core::{EventId, EventState};

use super::{OutboxStore, PgStore, RepositoryError};
use crate::models::{OrderEvent, OutboxCounts};

const EVENT_COLUMNS: &str = "id, event_type, order_id, restaurant_id, payload, state, attempts, \
     next_attempt_at, last_error, created_at, delivered_at";

#[async_trait]
impl OutboxStore for PgStore {
    async fn claim_due_events(
        &self,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OrderEvent>, RepositoryError> {
        // SKIP LOCKED lets several dispatchers share the table without
        // claiming the same rows
        let sql = format!(
            "UPDATE order_events \
             SET next_attempt_at = NOW() + make_interval(secs => $2) \
             WHERE id IN ( \
                 SELECT id FROM order_events \
                 WHERE state = 'PENDING' AND next_attempt_at <= NOW() \
                 ORDER BY next_attempt_at, id \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {EVENT_COLUMNS}"
        );

        let mut events = sqlx::query_as::<_, OrderEvent>(&sql)
            .bind(i64::from(limit))
            .bind(lease.as_secs_f64())
            .fetch_all(self.pool())
            .await?;

        // RETURNING order is unspecified
        events.sort_by_key(|e| (e.created_at, e.id));
        Ok(events)
    }

    async fn mark_delivered(&self, id: EventId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE order_events \
             SET state = $2, delivered_at = NOW(), last_error = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(EventState::Delivered)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: EventId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let (state, next_attempt_at) = match retry_at {
            Some(at) => (EventState::Pending, at),
            None => (EventState::Dead, Utc::now()),
        };

        let result = sqlx::query(
            "UPDATE order_events \
             SET attempts = attempts + 1, last_error = $2, state = $3, next_attempt_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(state)
        .bind(next_attempt_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn outbox_counts(&self) -> Result<OutboxCounts, RepositoryError> {
        let rows: Vec<(EventState, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM order_events GROUP BY state")
                .fetch_all(self.pool())
                .await?;

        let mut counts = OutboxCounts::default();
        for (state, count) in rows {
            match state {
                EventState::Pending => counts.pending = count,
                EventState::Delivered => counts.delivered = count,
                EventState::Dead => counts.dead = count,
            }
        }
        Ok(counts)
    }
}
