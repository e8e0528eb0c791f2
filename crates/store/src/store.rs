use std::ops::Range;

use async_trait::async_trait;
use common::{
    CartId, CartItem, EntityClass, Money, NewCartItem, Order, OrderField, OrderId, OrderItem,
    Price, Product, ProductField, ProductId, Session, User, UserId,
};

use crate::Result;

/// The shared sequential counter.
///
/// This is the only shared mutable state in the system. Implementations
/// must perform the read-increment-write as one atomic step so concurrent
/// callers never observe the same value.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Reserves `count` consecutive sequence numbers for `class`.
    ///
    /// Returns the reserved range, starting at the pre-increment counter
    /// value. Fails without consuming any number if the write cannot
    /// complete. `count` must be at least 1.
    async fn allocate_block(&self, class: EntityClass, count: u64) -> Result<Range<u64>>;

    /// Reserves a single sequence number and returns it.
    async fn allocate(&self, class: EntityClass) -> Result<u64> {
        Ok(self.allocate_block(class, 1).await?.start)
    }

    /// Reads the current counter value without changing it.
    async fn current(&self, class: EntityClass) -> Result<u64>;
}

/// Cart lines.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Creates an empty cart. Creating an existing cart is a no-op.
    async fn create_cart(&self, cart_id: &CartId) -> Result<()>;

    async fn cart_exists(&self, cart_id: &CartId) -> Result<bool>;

    /// Returns every line of the cart in insertion order.
    async fn list_items(&self, cart_id: &CartId) -> Result<Vec<CartItem>>;

    async fn add_item(&self, item: NewCartItem) -> Result<CartItem>;

    /// Removes a line. Fails with `NotFound` if the line is not in this cart.
    async fn remove_item(&self, cart_id: &CartId, item_id: i64) -> Result<()>;

    /// Sets the quantity of a line in this cart.
    async fn update_quantity(
        &self,
        cart_id: &CartId,
        item_id: i64,
        quantity: u32,
    ) -> Result<CartItem>;
}

/// Unit of work that writes an order's items and header together.
///
/// Nothing is visible to readers until [`CheckoutTx::commit`] succeeds.
/// Dropping the value without committing discards every staged write.
#[async_trait]
pub trait CheckoutTx: Send {
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;

    /// Stages the header. Fails with `Conflict` if the order already exists.
    async fn insert_order_header(&mut self, order: &Order) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Orders and their item snapshots.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>>;

    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    async fn list_orders(&self) -> Result<Vec<Order>>;

    async fn list_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>>;

    async fn count_orders(&self) -> Result<u64>;

    /// Sets one allow-listed column and bumps `updated_at`.
    async fn update_order_field(
        &self,
        order_id: &OrderId,
        field: OrderField,
        value: &str,
    ) -> Result<Order>;
}

/// Products and their per-size prices.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a batch of products atomically.
    async fn insert_products(&self, products: &[Product]) -> Result<()>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn products_by_category(&self, category: &str) -> Result<Vec<Product>>;

    async fn find_product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    async fn update_product_field(
        &self,
        product_id: &ProductId,
        field: ProductField,
        value: &str,
    ) -> Result<Product>;

    async fn delete_product(&self, product_id: &ProductId) -> Result<()>;

    /// Creates or replaces the price of a product in one size.
    async fn upsert_price(&self, product_id: &ProductId, size: &str, price: Money)
    -> Result<Price>;

    /// Changes an existing price. Fails with `NotFound` if none is set.
    async fn update_price(&self, product_id: &ProductId, size: &str, price: Money)
    -> Result<Price>;

    async fn list_prices(&self) -> Result<Vec<Price>>;

    async fn find_price(&self, product_id: &ProductId, size: &str) -> Result<Option<Price>>;
}

/// Registered accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` on a taken username and with
    /// `AllocationConflict` on a taken id.
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn find_user(&self, user_id: &UserId) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
}

/// Bearer-token sessions, keyed by token digest.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<()>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>>;

    async fn delete_session(&self, token_hash: &str) -> Result<()>;
}

/// Everything the HTTP layer needs from one backing store.
pub trait Store:
    CounterStore + CartStore + OrderStore + CatalogStore + UserStore + SessionStore + Clone + 'static
{
}

impl<T> Store for T where
    T: CounterStore
        + CartStore
        + OrderStore
        + CatalogStore
        + UserStore
        + SessionStore
        + Clone
        + 'static
{
}
