//! Order repository for `PostgreSQL`.

use async_trait::async_trait;
use sqlx::types::Json;

use food_delivery_core::{OrderId, OrderStatus, PaymentStatus, UserId};

use super::{OrderStore, PgStore, RepositoryError};
use crate::models::{NewOrder, ORDER_CREATED, Order, OrderCreatedPayload};

const ORDER_COLUMNS: &str = "id, user_id, restaurant_id, restaurant_name, items, total_amount, \
     delivery_address, status, payment_status, created_at, updated_at";

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let sql = format!(
            "INSERT INTO orders \
             (user_id, restaurant_id, restaurant_name, items, total_amount, delivery_address) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ORDER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(order.user_id)
            .bind(order.restaurant_id)
            .bind(&order.restaurant_name)
            .bind(Json(&order.items))
            .bind(order.total_amount)
            .bind(&order.delivery_address)
            .fetch_one(&mut *tx)
            .await?;

        let payload = serde_json::to_value(OrderCreatedPayload {
            order_id: created.id,
            restaurant_id: created.restaurant_id,
        })
        .map_err(|e| RepositoryError::DataCorruption(format!("unencodable event payload: {e}")))?;

        sqlx::query(
            "INSERT INTO order_events (event_type, order_id, restaurant_id, payload) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(ORDER_CREATED)
        .bind(created.id)
        .bind(created.restaurant_id)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(order)
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        // Compare-and-set: a concurrent transition makes this match zero rows
        let sql = format!(
            "UPDATE orders SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {ORDER_COLUMNS}"
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(expected)
            .bind(next)
            .fetch_optional(self.pool())
            .await?;

        Ok(order)
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "UPDATE orders SET payment_status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );

        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(payment_status)
            .fetch_optional(self.pool())
            .await?;

        Ok(order)
    }
}
