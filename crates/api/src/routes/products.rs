//! Catalog endpoints. Reads are public; writes need an administrator.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{NewProduct, Product, ProductId};
use serde::Deserialize;
use store::Store;

use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub new_value: String,
}

/// GET /products
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// GET /products/category/{category}
pub async fn by_category<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.products_by_category(&category).await?))
}

/// GET /products/{product_id}
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id = ProductId::parse(product_id)?;
    Ok(Json(state.catalog.find_product(&product_id).await?))
}

/// POST /products: creates a batch of products with consecutive ids.
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Json(products): Json<Vec<NewProduct>>,
) -> Result<(StatusCode, Json<Vec<Product>>), ApiError> {
    let created = state.catalog.create_products(products).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /products/{product_id}/{field}
pub async fn update_field<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path((product_id, field)): Path<(String, String)>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let product_id = ProductId::parse(product_id)?;
    let product = state
        .catalog
        .update_product_field(&product_id, &field, &req.new_value)
        .await?;
    Ok(Json(product))
}

/// DELETE /products/{product_id}: also removes the product's prices.
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id = ProductId::parse(product_id)?;
    state.catalog.delete_product(&product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
