//! Restaurant and menu browsing.

use thiserror::Error;

use food_delivery_core::RestaurantId;

use crate::db::{CatalogStore, RepositoryError};
use crate::models::{MenuItem, Restaurant};

/// Errors that can occur while browsing the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Restaurant not found")]
    RestaurantNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Read-only access to restaurants and menus.
pub struct CatalogService<'a> {
    catalog: &'a dyn CatalogStore,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn CatalogStore) -> Self {
        Self { catalog }
    }

    /// Open restaurants, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if storage fails.
    pub async fn list_restaurants(&self) -> Result<Vec<Restaurant>, CatalogError> {
        Ok(self.catalog.list_open_restaurants().await?)
    }

    /// A single restaurant, open or closed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::RestaurantNotFound` if there is no such restaurant.
    pub async fn get_restaurant(&self, id: RestaurantId) -> Result<Restaurant, CatalogError> {
        self.catalog
            .get_restaurant(id)
            .await?
            .ok_or(CatalogError::RestaurantNotFound)
    }

    /// Available items on a restaurant's menu.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::RestaurantNotFound` if there is no such restaurant.
    pub async fn list_menu(&self, restaurant_id: RestaurantId) -> Result<Vec<MenuItem>, CatalogError> {
        if self.catalog.get_restaurant(restaurant_id).await?.is_none() {
            return Err(CatalogError::RestaurantNotFound);
        }
        Ok(self.catalog.list_available_menu(restaurant_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::seed::{self, CatalogSeed};

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let mut catalog = CatalogSeed::embedded().unwrap();
        catalog.demo_user = None;
        seed::apply(&store, &catalog).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_closed_restaurants_hidden_from_list() {
        let store = seeded().await;
        let mut closed = CatalogService::new(&store)
            .get_restaurant(RestaurantId::new(2))
            .await
            .unwrap();
        closed.is_open = false;
        store.upsert_restaurant(closed).await;

        let catalog = CatalogService::new(&store);
        let ids: Vec<i32> = catalog
            .list_restaurants()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id.as_i32())
            .collect();
        assert_eq!(ids, vec![1, 3, 4, 5, 6]);

        // Still reachable directly
        assert!(catalog.get_restaurant(RestaurantId::new(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_menu_only_available_items_of_that_restaurant() {
        let store = seeded().await;
        let catalog = CatalogService::new(&store);

        let mut naan = catalog
            .list_menu(RestaurantId::new(1))
            .await
            .unwrap()
            .into_iter()
            .find(|i| i.name == "Garlic Naan")
            .unwrap();
        naan.is_available = false;
        store.upsert_menu_item(naan).await;

        let menu = catalog.list_menu(RestaurantId::new(1)).await.unwrap();
        assert_eq!(menu.len(), 4);
        assert!(menu.iter().all(|i| i.is_available));
        assert!(menu.iter().all(|i| i.restaurant_id == RestaurantId::new(1)));
    }

    #[tokio::test]
    async fn test_unknown_restaurant() {
        let store = seeded().await;
        let catalog = CatalogService::new(&store);

        assert!(matches!(
            catalog.list_menu(RestaurantId::new(999)).await,
            Err(CatalogError::RestaurantNotFound)
        ));
        assert!(matches!(
            catalog.get_restaurant(RestaurantId::new(999)).await,
            Err(CatalogError::RestaurantNotFound)
        ));
    }
}
