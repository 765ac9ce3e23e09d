//! Seed the catalog and demo account.
//!
//! Uses the catalog embedded in the server unless `--file` points at another
//! YAML file of the same shape. Seeding an already populated database only
//! creates what is missing.

use std::path::Path;

use tracing::info;

use food_delivery_server::db::PgStore;
use food_delivery_server::seed::{self, CatalogSeed};

/// Seed the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, `DATABASE_URL` is
/// missing, or a database operation fails.
pub async fn run(file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    // Parse before connecting so a bad file fails fast
    let catalog = match file {
        Some(path) => {
            info!(path = %path.display(), "Loading catalog from file");
            let content = tokio::fs::read_to_string(path).await?;
            CatalogSeed::from_yaml(&content)?
        }
        None => CatalogSeed::embedded()?,
    };
    info!(
        restaurants = catalog.restaurants.len(),
        menu_items = catalog.menu_item_count(),
        "Parsed catalog"
    );

    let store = PgStore::new(super::connect().await?);
    let report = seed::apply(&store, &catalog).await?;

    info!("Seeding complete!");
    info!("  Restaurants inserted: {}", report.restaurants);
    info!("  Menu items inserted: {}", report.menu_items);
    info!("  Demo user created: {}", report.demo_user);

    Ok(())
}
