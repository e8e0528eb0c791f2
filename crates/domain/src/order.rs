//! Order lookup and administration.

use common::{Order, OrderField, OrderId, OrderItem, ValidationError};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::error::DomainError;

/// An order header together with its item snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Service for reading and patching orders after checkout.
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn find_order(&self, order_id: &OrderId) -> Result<OrderWithItems, DomainError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("order {order_id}")))?;
        let items = self.store.list_order_items(order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn count_orders(&self) -> Result<u64, DomainError> {
        Ok(self.store.count_orders().await?)
    }

    /// Patches the allow-listed field named by `field`.
    ///
    /// Names outside [`OrderField`] are rejected before storage is touched.
    #[tracing::instrument(skip(self, value), fields(order_id = %order_id))]
    pub async fn update_field(
        &self,
        order_id: &OrderId,
        field: &str,
        value: &str,
    ) -> Result<Order, DomainError> {
        let field: OrderField = field.parse()?;
        if field == OrderField::Status {
            return self.update_status(order_id, value).await;
        }

        let order = self
            .store
            .update_order_field(order_id, field, value)
            .await?;
        tracing::info!(field = %field, "Order updated");
        Ok(order)
    }

    /// Sets the order status.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn update_status(&self, order_id: &OrderId, status: &str) -> Result<Order, DomainError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ValidationError::Required("status").into());
        }

        let order = self
            .store
            .update_order_field(order_id, OrderField::Status, status)
            .await?;
        tracing::info!(status = %order.status, "Order status updated");
        Ok(order)
    }
}
