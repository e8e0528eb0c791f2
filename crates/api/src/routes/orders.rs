//! Order lookup and administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Order, OrderId};
use domain::OrderWithItems;
use saga::InconsistentOrder;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::{AdminPrincipal, Principal};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub value: String,
}

#[derive(Serialize)]
pub struct OrderCountResponse {
    pub number_of_orders: u64,
}

/// GET /orders/count
pub async fn count<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
) -> Result<Json<OrderCountResponse>, ApiError> {
    let number_of_orders = state.orders.count_orders().await?;
    Ok(Json(OrderCountResponse { number_of_orders }))
}

/// GET /orders/inconsistent: orders an interrupted checkout left behind.
pub async fn inconsistent<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<InconsistentOrder>>, ApiError> {
    Ok(Json(state.recovery.scan().await?))
}

/// GET /orders/{order_id}
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(order_id): Path<String>,
) -> Result<Json<OrderWithItems>, ApiError> {
    let order_id = OrderId::parse(order_id)?;
    principal.ensure_order_access(&order_id)?;
    Ok(Json(state.orders.find_order(&order_id).await?))
}

/// PUT /orders/{order_id}/{field}: patches one allow-listed column.
pub async fn update_field<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path((order_id, field)): Path<(String, String)>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId::parse(order_id)?;
    let order = state
        .orders
        .update_field(&order_id, &field, &req.value)
        .await?;
    Ok(Json(order))
}

/// PUT /orders/{order_id}/status/{status}
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path((order_id, status)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId::parse(order_id)?;
    Ok(Json(state.orders.update_status(&order_id, &status).await?))
}
