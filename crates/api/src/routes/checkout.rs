//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CartId, OrderDetails};
use saga::CheckoutOutcome;
use store::Store;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /carts/{cart_id}/checkout: runs the checkout saga.
///
/// A declined payment still creates the order and answers `201` with status
/// `payment_failed`.
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(cart_id): Path<String>,
    Json(details): Json<OrderDetails>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let cart_id = CartId::parse(cart_id)?;
    principal.ensure_cart_access(&cart_id)?;

    let outcome = state.checkout.checkout(&cart_id, details).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
