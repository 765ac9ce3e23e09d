//! Order route handlers.
//!
//! Customer routes require a bearer token and only ever see the caller's
//! own orders. The status and payment-status routes are for other services
//! and require the internal token instead.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use food_delivery_core::{OrderId, OrderStatus, PaymentStatus};

use crate::error::{ApiJson, ApiPath, AppError, Result};
use crate::middleware::{RequireAuth, RequireInternal};
use crate::models::Order;
use crate::services::orders::{CreateOrder, OrderService};
use crate::state::AppState;

/// Status update body. Parsed by hand so unknown values get a clear 400.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Payment status update body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    pub payment_status: String,
}

fn orders(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.store(), state.outbox_wake())
}

/// `POST /orders`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = orders(&state).create_order(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders`
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let list = orders(&state).list_orders(user.id).await?;
    Ok(Json(list))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = orders(&state).get_order(id, user.id).await?;
    Ok(Json(order))
}

/// `PUT /orders/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    _internal: RequireInternal,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> Result<Json<Order>> {
    let status: OrderStatus = body
        .status
        .parse()
        .map_err(|e: food_delivery_core::ParseStatusError| AppError::BadRequest(e.to_string()))?;

    let order = orders(&state).update_status(id, status).await?;
    Ok(Json(order))
}

/// `PUT /orders/{id}/payment-status`
pub async fn update_payment_status(
    State(state): State<AppState>,
    _internal: RequireInternal,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<PaymentStatusUpdate>,
) -> Result<Json<Order>> {
    let payment_status: PaymentStatus = body
        .payment_status
        .parse()
        .map_err(|e: food_delivery_core::ParseStatusError| AppError::BadRequest(e.to_string()))?;

    let order = orders(&state)
        .update_payment_status(id, payment_status)
        .await?;
    Ok(Json(order))
}
