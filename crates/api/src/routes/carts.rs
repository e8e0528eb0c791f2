//! Cart endpoints. Callers may only touch their own cart unless they are
//! administrators.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CartId, CartItem, ValidationError};
use domain::AddCartItem;
use store::Store;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

fn authorized_cart(principal: &Principal, cart_id: String) -> Result<CartId, ApiError> {
    let cart_id = CartId::parse(cart_id)?;
    principal.ensure_cart_access(&cart_id)?;
    Ok(cart_id)
}

/// GET /carts/{cart_id}/items
pub async fn list_items<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(cart_id): Path<String>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let cart_id = authorized_cart(&principal, cart_id)?;
    Ok(Json(state.carts.list_items(&cart_id).await?))
}

/// POST /carts/{cart_id}/items: adds a line at the catalog price.
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(cart_id): Path<String>,
    Json(req): Json<AddCartItem>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let cart_id = authorized_cart(&principal, cart_id)?;
    let item = state.carts.add_item(&cart_id, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /carts/{cart_id}/items/{item_id}
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path((cart_id, item_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let cart_id = authorized_cart(&principal, cart_id)?;
    state.carts.remove_item(&cart_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /carts/{cart_id}/items/{item_id}/{quantity}
pub async fn update_quantity<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path((cart_id, item_id, quantity)): Path<(String, i64, String)>,
) -> Result<Json<CartItem>, ApiError> {
    let cart_id = authorized_cart(&principal, cart_id)?;
    let quantity: u32 = quantity
        .parse()
        .map_err(|_| ValidationError::InvalidQuantity(quantity.clone()))?;
    let item = state
        .carts
        .update_quantity(&cart_id, item_id, quantity)
        .await?;
    Ok(Json(item))
}
