//! Catalog administration and browsing.

use chrono::Utc;
use common::{Money, NewProduct, Price, Product, ProductField, ProductId, ValidationError};
use store::{CatalogStore, CounterStore};

use crate::{allocator::IdAllocator, error::DomainError};

/// Service for products and their prices.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
    ids: IdAllocator<S>,
}

impl<S: CatalogStore + CounterStore + Clone> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self {
            ids: IdAllocator::new(store.clone()),
            store,
        }
    }

    /// Creates a batch of products.
    ///
    /// The whole batch draws its identifiers from one counter step and is
    /// inserted atomically.
    #[tracing::instrument(skip(self, products), fields(count = products.len()))]
    pub async fn create_products(
        &self,
        products: Vec<NewProduct>,
    ) -> Result<Vec<Product>, DomainError> {
        if products.is_empty() {
            return Err(ValidationError::Required("products").into());
        }
        for product in &products {
            product.validate()?;
        }

        let ids = self.ids.next_product_ids(products.len()).await?;
        let now = Utc::now();
        let created: Vec<Product> = ids
            .into_iter()
            .zip(products)
            .map(|(product_id, new)| Product {
                product_id,
                image: new.image,
                name: new.name,
                description: new.description,
                category: new.category,
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.store
            .insert_products(&created)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to insert product batch"))?;

        tracing::info!(count = created.len(), "Products created");
        Ok(created)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }

    pub async fn products_by_category(&self, category: &str) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.products_by_category(category).await?)
    }

    pub async fn find_product(&self, product_id: &ProductId) -> Result<Product, DomainError> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("product {product_id}")))
    }

    /// Edits one allow-listed product field named by `field`.
    #[tracing::instrument(skip(self, value), fields(product_id = %product_id))]
    pub async fn update_product_field(
        &self,
        product_id: &ProductId,
        field: &str,
        value: &str,
    ) -> Result<Product, DomainError> {
        let field: ProductField = field.parse()?;
        Ok(self
            .store
            .update_product_field(product_id, field, value)
            .await?)
    }

    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), DomainError> {
        Ok(self.store.delete_product(product_id).await?)
    }

    /// Creates or replaces a price. Prices must be positive.
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_price(
        &self,
        product_id: &ProductId,
        size: &str,
        price: Money,
    ) -> Result<Price, DomainError> {
        let price = price.ensure_positive()?;
        if size.trim().is_empty() {
            return Err(ValidationError::Required("size").into());
        }
        Ok(self.store.upsert_price(product_id, size, price).await?)
    }

    /// Changes an existing price. Prices must be positive.
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_price(
        &self,
        product_id: &ProductId,
        size: &str,
        price: Money,
    ) -> Result<Price, DomainError> {
        let price = price.ensure_positive()?;
        Ok(self.store.update_price(product_id, size, price).await?)
    }

    pub async fn list_prices(&self) -> Result<Vec<Price>, DomainError> {
        Ok(self.store.list_prices().await?)
    }
}
