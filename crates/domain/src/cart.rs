//! Cart operations.

use common::{CartId, CartItem, NewCartItem, ProductId, validate_quantity};
use serde::{Deserialize, Serialize};
use store::{CartStore, CatalogStore};

use crate::error::DomainError;

/// Request to add a line to a cart. The unit price comes from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddCartItem {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
}

/// Service for managing cart lines.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: CartStore + CatalogStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the lines of a cart.
    #[tracing::instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn list_items(&self, cart_id: &CartId) -> Result<Vec<CartItem>, DomainError> {
        if !self.store.cart_exists(cart_id).await? {
            return Err(DomainError::NotFound(format!("cart {cart_id}")));
        }
        Ok(self.store.list_items(cart_id).await?)
    }

    /// Adds a line priced at the product's current price for `size`.
    #[tracing::instrument(skip(self, request), fields(cart_id = %cart_id, product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        cart_id: &CartId,
        request: AddCartItem,
    ) -> Result<CartItem, DomainError> {
        let quantity = validate_quantity(request.quantity)?;

        let price = self
            .store
            .find_price(&request.product_id, &request.size)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "price of product {} in size {}",
                    request.product_id, request.size
                ))
            })?;

        let item = self
            .store
            .add_item(NewCartItem {
                cart_id: cart_id.clone(),
                product_id: request.product_id,
                size: request.size,
                unit_price: price.price,
                quantity,
                notes: request.notes,
            })
            .await?;

        tracing::info!(item_id = item.item_id, "Cart item added");
        Ok(item)
    }

    /// Removes a line. The line must belong to `cart_id`.
    #[tracing::instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn remove_item(&self, cart_id: &CartId, item_id: i64) -> Result<(), DomainError> {
        Ok(self.store.remove_item(cart_id, item_id).await?)
    }

    /// Changes the quantity of a line. The line must belong to `cart_id`.
    ///
    /// The quantity is held to the same range as [`add_item`](Self::add_item).
    #[tracing::instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn update_quantity(
        &self,
        cart_id: &CartId,
        item_id: i64,
        quantity: u32,
    ) -> Result<CartItem, DomainError> {
        let quantity = validate_quantity(quantity)?;
        Ok(self
            .store
            .update_quantity(cart_id, item_id, quantity)
            .await?)
    }
}
