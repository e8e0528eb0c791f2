//! Detection of orders left inconsistent by an interrupted checkout.

use std::fmt;

use common::{Order, OrderId, OrderStatus};
use serde::{Deserialize, Serialize};
use store::{OrderStore, StoreError};

/// Why an order needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyReason {
    /// A header exists without any order items.
    MissingItems,
    /// The order is `pending` but no payment reference was recorded.
    MissingPaymentReference,
}

impl fmt::Display for InconsistencyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InconsistencyReason::MissingItems => f.write_str("missing_items"),
            InconsistencyReason::MissingPaymentReference => {
                f.write_str("missing_payment_reference")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InconsistentOrder {
    pub order_id: OrderId,
    pub reason: InconsistencyReason,
}

/// Scans stored orders for inconsistencies.
///
/// A checkout that is between commit and payment reconciliation also shows
/// up as missing its payment reference until it finishes.
pub struct RecoveryScan<S> {
    store: S,
}

impl<S: OrderStore> RecoveryScan<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn scan(&self) -> Result<Vec<InconsistentOrder>, StoreError> {
        let mut found = Vec::new();
        for order in self.store.list_orders().await? {
            let item_count = self.store.list_order_items(&order.order_id).await?.len();
            if let Some(reason) = classify(&order, item_count) {
                found.push(InconsistentOrder {
                    order_id: order.order_id,
                    reason,
                });
            }
        }

        if !found.is_empty() {
            tracing::warn!(count = found.len(), "Inconsistent orders found");
        }
        Ok(found)
    }
}

fn classify(order: &Order, item_count: usize) -> Option<InconsistencyReason> {
    if item_count == 0 {
        Some(InconsistencyReason::MissingItems)
    } else if order.status == OrderStatus::Pending && order.payment_id.is_none() {
        Some(InconsistencyReason::MissingPaymentReference)
    } else {
        None
    }
}
