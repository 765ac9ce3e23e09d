//! Restaurant and menu repository for `PostgreSQL`.

use async_trait::async_trait;

use food_delivery_core::{MenuItemId, RestaurantId};

use super::{CatalogStore, PgStore, RepositoryError};
use crate::models::{MenuItem, Restaurant};
use crate::seed::RestaurantSeed;

const RESTAURANT_COLUMNS: &str =
    "id, name, cuisine, rating, delivery_time, image, is_open, address, phone, created_at";

const MENU_ITEM_COLUMNS: &str =
    "id, restaurant_id, name, description, price, category, image, is_available";

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_open_restaurants(&self) -> Result<Vec<Restaurant>, RepositoryError> {
        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE is_open ORDER BY id");

        let restaurants = sqlx::query_as::<_, Restaurant>(&sql)
            .fetch_all(self.pool())
            .await?;

        Ok(restaurants)
    }

    async fn get_restaurant(
        &self,
        id: RestaurantId,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1");

        let restaurant = sqlx::query_as::<_, Restaurant>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(restaurant)
    }

    async fn list_available_menu(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<MenuItem>, RepositoryError> {
        let sql = format!(
            "SELECT {MENU_ITEM_COLUMNS} FROM menu_items \
             WHERE restaurant_id = $1 AND is_available \
             ORDER BY id"
        );

        let items = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(restaurant_id)
            .fetch_all(self.pool())
            .await?;

        Ok(items)
    }

    async fn get_menu_items(
        &self,
        restaurant_id: RestaurantId,
        ids: &[MenuItemId],
    ) -> Result<Vec<MenuItem>, RepositoryError> {
        let sql = format!(
            "SELECT {MENU_ITEM_COLUMNS} FROM menu_items \
             WHERE restaurant_id = $1 AND id = ANY($2) \
             ORDER BY id"
        );
        let ids: Vec<i32> = ids.iter().map(MenuItemId::as_i32).collect();

        let items = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(restaurant_id)
            .bind(&ids)
            .fetch_all(self.pool())
            .await?;

        Ok(items)
    }

    async fn seed_catalog(&self, restaurants: &[RestaurantSeed]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        // Serialize concurrent seeders; the existence check below is then race-free
        sqlx::query("LOCK TABLE restaurants IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM restaurants")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        for restaurant in restaurants {
            sqlx::query(
                "INSERT INTO restaurants \
                 (id, name, cuisine, rating, delivery_time, image, is_open, address, phone) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(restaurant.id)
            .bind(&restaurant.name)
            .bind(&restaurant.cuisine)
            .bind(restaurant.rating)
            .bind(&restaurant.delivery_time)
            .bind(&restaurant.image)
            .bind(restaurant.is_open)
            .bind(&restaurant.address)
            .bind(&restaurant.phone)
            .execute(&mut *tx)
            .await?;

            for item in &restaurant.menu {
                sqlx::query(
                    "INSERT INTO menu_items \
                     (id, restaurant_id, name, description, price, category, image, is_available) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(item.id)
                .bind(restaurant.id)
                .bind(&item.name)
                .bind(&item.description)
                .bind(item.price)
                .bind(&item.category)
                .bind(&item.image)
                .bind(item.is_available)
                .execute(&mut *tx)
                .await?;
            }
        }

        // Explicit IDs bypass the sequences; move them past the seeded rows
        for table in ["restaurants", "menu_items"] {
            sqlx::query(&format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
                 GREATEST((SELECT MAX(id) FROM {table}), 1))"
            ))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(restaurants.len())
    }
}
