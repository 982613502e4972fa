//! Order administration.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use opticart_core::{Order, OrderId, OrderStatus};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Filters for the admin order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    /// Only apply the change if the order is still in this status.
    #[serde(default)]
    pub expected: Option<OrderStatus>,
}

/// Every order, newest first, optionally filtered by status.
#[instrument(skip(state, admin), fields(user_id = %admin.user_id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    let mut orders = state.orders().list(Some(&admin)).await?;
    if let Some(status) = filter.status {
        orders.retain(|order| order.status == status);
    }
    Ok(Json(orders))
}

/// Overwrite an order's status and return the updated order.
#[instrument(skip(state, admin, request), fields(order_id = %id, status = %request.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Order>> {
    state
        .orders()
        .update_status(&admin, &id, request.status, request.expected)
        .await?;

    let order = state
        .orders()
        .fetch(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(order))
}
