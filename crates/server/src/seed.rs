//! Demo catalog and account seeding.
//!
//! The catalog lives in `seed/catalog.yaml` and is embedded into the binary.
//! `fd-cli seed` applies it to `PostgreSQL`; the in-memory backend applies
//! it at startup. Applying a seed twice is a no-op.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use food_delivery_core::{
    Email, EmailError, MenuItemId, Price, RestaurantId, Username, UsernameError,
};

use crate::db::{RepositoryError, Store};
use crate::models::{MenuItem, NewUser, Restaurant};
use crate::services::auth::{AuthError, hash_password};

/// The catalog shipped with the service.
pub const EMBEDDED_CATALOG: &str = include_str!("../seed/catalog.yaml");

/// Errors that can occur while loading or applying a seed.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid seed file: {0}")]
    Invalid(String),

    #[error("invalid demo user email: {0}")]
    Email(#[from] EmailError),

    #[error("invalid demo user username: {0}")]
    Username(#[from] UsernameError),

    #[error("failed to hash demo user password: {0}")]
    Password(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A parsed seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSeed {
    pub restaurants: Vec<RestaurantSeed>,
    #[serde(default)]
    pub demo_user: Option<DemoUserSeed>,
}

/// A restaurant with its menu.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSeed {
    pub id: RestaurantId,
    pub name: String,
    pub cuisine: String,
    pub rating: f64,
    pub delivery_time: String,
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_true")]
    pub is_open: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub menu: Vec<MenuItemSeed>,
}

/// A menu item; it belongs to the enclosing restaurant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemSeed {
    pub id: MenuItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// Account created alongside the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoUserSeed {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// What applying a seed changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Restaurants inserted (0 if the catalog already had data).
    pub restaurants: usize,
    /// Menu items inserted.
    pub menu_items: usize,
    /// Whether the demo user was created.
    pub demo_user: bool,
}

const fn default_true() -> bool {
    true
}

impl CatalogSeed {
    /// Parse a seed from YAML and check it for duplicate IDs.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` for malformed YAML and `SeedError::Invalid`
    /// for duplicate restaurant or menu item IDs.
    pub fn from_yaml(yaml: &str) -> Result<Self, SeedError> {
        let seed: Self = serde_yaml::from_str(yaml)?;
        seed.validate()?;
        Ok(seed)
    }

    /// The catalog embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded file is malformed.
    pub fn embedded() -> Result<Self, SeedError> {
        Self::from_yaml(EMBEDDED_CATALOG)
    }

    fn validate(&self) -> Result<(), SeedError> {
        let mut restaurant_ids = std::collections::HashSet::new();
        let mut item_ids = std::collections::HashSet::new();

        for restaurant in &self.restaurants {
            if !restaurant_ids.insert(restaurant.id) {
                return Err(SeedError::Invalid(format!(
                    "duplicate restaurant id {}",
                    restaurant.id
                )));
            }
            for item in &restaurant.menu {
                if !item_ids.insert(item.id) {
                    return Err(SeedError::Invalid(format!(
                        "duplicate menu item id {}",
                        item.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of menu items across all restaurants.
    #[must_use]
    pub fn menu_item_count(&self) -> usize {
        self.restaurants.iter().map(|r| r.menu.len()).sum()
    }
}

impl RestaurantSeed {
    /// Build the stored restaurant.
    #[must_use]
    pub fn to_restaurant(&self, created_at: DateTime<Utc>) -> Restaurant {
        Restaurant {
            id: self.id,
            name: self.name.clone(),
            cuisine: self.cuisine.clone(),
            rating: self.rating,
            delivery_time: self.delivery_time.clone(),
            image: self.image.clone(),
            is_open: self.is_open,
            address: self.address.clone(),
            phone: self.phone.clone(),
            created_at,
        }
    }
}

impl MenuItemSeed {
    /// Build the stored menu item for `restaurant_id`.
    #[must_use]
    pub fn to_menu_item(&self, restaurant_id: RestaurantId) -> MenuItem {
        MenuItem {
            id: self.id,
            restaurant_id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            category: self.category.clone(),
            image: self.image.clone(),
            is_available: self.is_available,
        }
    }
}

/// Apply a seed: catalog first, then the demo user.
///
/// # Errors
///
/// Returns an error if the demo user is invalid or storage fails.
pub async fn apply(store: &dyn Store, seed: &CatalogSeed) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    report.restaurants = store.seed_catalog(&seed.restaurants).await?;
    if report.restaurants == 0 {
        info!("Catalog already present, skipping restaurants");
    } else {
        report.menu_items = seed.menu_item_count();
        info!(
            restaurants = report.restaurants,
            menu_items = report.menu_items,
            "Seeded catalog"
        );
    }

    if let Some(demo) = &seed.demo_user {
        let email = Email::parse(&demo.email)?;
        if store.email_taken(&email).await? {
            info!(email = %email, "Demo user already exists, skipping");
        } else {
            let password_hash = hash_password(&demo.password).await?;
            store
                .create_user(NewUser {
                    email,
                    username: Username::parse(&demo.username)?,
                    password_hash,
                    full_name: demo.full_name.clone(),
                    phone: demo.phone.clone(),
                })
                .await?;
            report.demo_user = true;
            info!(email = %demo.email, "Created demo user");
        }
    }

    Ok(report)
}
