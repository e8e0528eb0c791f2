//! Price endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, Price, ProductId};
use serde::Deserialize;
use store::Store;

use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

/// Price in cents for one product size.
#[derive(Deserialize)]
pub struct SetPriceRequest {
    pub product_id: ProductId,
    pub size: String,
    pub price: Money,
}

/// GET /prices
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Price>>, ApiError> {
    Ok(Json(state.catalog.list_prices().await?))
}

/// POST /prices: sets the price of a product in one size.
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Json(req): Json<SetPriceRequest>,
) -> Result<(StatusCode, Json<Price>), ApiError> {
    let price = state
        .catalog
        .set_price(&req.product_id, &req.size, req.price)
        .await?;
    Ok((StatusCode::CREATED, Json(price)))
}

/// PUT /prices/{product_id}/{size}/{price}
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path((product_id, size, cents)): Path<(String, String, i64)>,
) -> Result<Json<Price>, ApiError> {
    let product_id = ProductId::parse(product_id)?;
    let price = state
        .catalog
        .update_price(&product_id, &size, Money::from_cents(cents))
        .await?;
    Ok(Json(price))
}
