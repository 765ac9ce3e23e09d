//! Restaurant and menu route handlers.

use axum::{Json, extract::State};

use food_delivery_core::RestaurantId;

use crate::error::{ApiPath, Result};
use crate::models::{MenuItem, Restaurant};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// `GET /restaurants`
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Restaurant>>> {
    let restaurants = CatalogService::new(state.store()).list_restaurants().await?;
    Ok(Json(restaurants))
}

/// `GET /restaurants/{id}`
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RestaurantId>,
) -> Result<Json<Restaurant>> {
    let restaurant = CatalogService::new(state.store()).get_restaurant(id).await?;
    Ok(Json(restaurant))
}

/// `GET /restaurants/{id}/menu`
pub async fn menu(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RestaurantId>,
) -> Result<Json<Vec<MenuItem>>> {
    let items = CatalogService::new(state.store()).list_menu(id).await?;
    Ok(Json(items))
}
