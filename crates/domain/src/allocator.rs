//! Sequential identifier allocation.

use common::{EntityClass, ProductId, UserId};
use store::CounterStore;

use crate::error::DomainError;

/// Mints user and product identifiers from the shared counter.
///
/// Every identifier comes from one atomic counter step, so concurrent
/// callers never receive the same value.
#[derive(Debug, Clone)]
pub struct IdAllocator<S> {
    store: S,
}

impl<S: CounterStore> IdAllocator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Allocates the next user identifier.
    #[tracing::instrument(skip(self))]
    pub async fn next_user_id(&self) -> Result<UserId, DomainError> {
        let sequence = self.store.allocate(EntityClass::Users).await?;
        record_allocation(EntityClass::Users, 1);
        Ok(UserId::from_sequence(sequence))
    }

    /// Allocates `count` consecutive product identifiers in one step.
    #[tracing::instrument(skip(self))]
    pub async fn next_product_ids(&self, count: usize) -> Result<Vec<ProductId>, DomainError> {
        let range = self
            .store
            .allocate_block(EntityClass::Products, count as u64)
            .await?;
        record_allocation(EntityClass::Products, count as u64);
        Ok(range.map(ProductId::from_sequence).collect())
    }
}

fn record_allocation(class: EntityClass, count: u64) {
    metrics::counter!("ids_allocated_total", "class" => class.as_str()).increment(count);
}
