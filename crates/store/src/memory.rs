use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartId, CartItem, EntityClass, Money, NewCartItem, Order, OrderField, OrderId, OrderItem,
    Price, Product, ProductField, ProductId, Session, User, UserId, ValidationError,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{CartStore, CatalogStore, CheckoutTx, CounterStore, OrderStore, SessionStore, UserStore},
};

/// Same column range as the Postgres `INTEGER` quantity.
fn check_quantity(quantity: u32) -> Result<u32> {
    if i32::try_from(quantity).is_ok() {
        Ok(quantity)
    } else {
        Err(ValidationError::InvalidQuantity(quantity.to_string()).into())
    }
}

/// Injected failures for exercising error paths in tests.
#[derive(Debug, Clone, Default)]
struct Faults {
    /// 1-based position of the order item insert that fails in every checkout.
    fail_order_item_at: Option<usize>,
    fail_order_updates: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    users_allocated: u64,
    products_allocated: u64,
    users: BTreeMap<UserId, User>,
    sessions: HashMap<String, Session>,
    products: BTreeMap<ProductId, Product>,
    prices: Vec<Price>,
    next_price_id: i64,
    carts: BTreeMap<CartId, DateTime<Utc>>,
    cart_items: Vec<CartItem>,
    next_cart_item_id: i64,
    orders: BTreeMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    next_order_item_id: i64,
    faults: Faults,
}

impl MemoryState {
    fn counter_mut(&mut self, class: EntityClass) -> &mut u64 {
        match class {
            EntityClass::Users => &mut self.users_allocated,
            EntityClass::Products => &mut self.products_allocated,
        }
    }
}

/// In-memory store for tests and local development.
///
/// All state sits behind one lock, so every trait method is atomic with
/// respect to every other. No method awaits anything while holding it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `position`-th (1-based) order item insert of every
    /// checkout fail. `None` disables the fault.
    pub async fn fail_order_item_insert_at(&self, position: Option<usize>) {
        self.state.write().await.faults.fail_order_item_at = position;
    }

    /// Makes every `update_order_field` call fail.
    pub async fn fail_order_updates(&self, fail: bool) {
        self.state.write().await.faults.fail_order_updates = fail;
    }

    /// Returns the number of order items across all orders.
    pub async fn order_item_count(&self) -> usize {
        self.state.read().await.order_items.len()
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn allocate_block(&self, class: EntityClass, count: u64) -> Result<Range<u64>> {
        if count == 0 {
            return Err(ValidationError::InvalidQuantity(count.to_string()).into());
        }

        let mut state = self.state.write().await;
        let counter = state.counter_mut(class);
        let start = *counter;
        let end = start
            .checked_add(count)
            .ok_or_else(|| StoreError::Unavailable(format!("{class} counter exhausted")))?;
        *counter = end;

        Ok(start..end)
    }

    async fn current(&self, class: EntityClass) -> Result<u64> {
        let state = self.state.read().await;
        Ok(match class {
            EntityClass::Users => state.users_allocated,
            EntityClass::Products => state.products_allocated,
        })
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn create_cart(&self, cart_id: &CartId) -> Result<()> {
        let mut state = self.state.write().await;
        state.carts.entry(cart_id.clone()).or_insert_with(Utc::now);
        Ok(())
    }

    async fn cart_exists(&self, cart_id: &CartId) -> Result<bool> {
        Ok(self.state.read().await.carts.contains_key(cart_id))
    }

    async fn list_items(&self, cart_id: &CartId) -> Result<Vec<CartItem>> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|item| &item.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn add_item(&self, item: NewCartItem) -> Result<CartItem> {
        let quantity = check_quantity(item.quantity)?;
        let mut state = self.state.write().await;
        if !state.carts.contains_key(&item.cart_id) {
            return Err(StoreError::NotFound(format!("cart {}", item.cart_id)));
        }

        state.next_cart_item_id += 1;
        let stored = CartItem {
            item_id: state.next_cart_item_id,
            cart_id: item.cart_id,
            product_id: item.product_id,
            size: item.size,
            unit_price: item.unit_price,
            quantity,
            notes: item.notes,
        };
        state.cart_items.push(stored.clone());
        Ok(stored)
    }

    async fn remove_item(&self, cart_id: &CartId, item_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|item| !(item.item_id == item_id && &item.cart_id == cart_id));

        if state.cart_items.len() == before {
            return Err(StoreError::NotFound(format!(
                "item {item_id} in cart {cart_id}"
            )));
        }
        Ok(())
    }

    async fn update_quantity(
        &self,
        cart_id: &CartId,
        item_id: i64,
        quantity: u32,
    ) -> Result<CartItem> {
        let quantity = check_quantity(quantity)?;
        let mut state = self.state.write().await;
        let item = state
            .cart_items
            .iter_mut()
            .find(|item| item.item_id == item_id && &item.cart_id == cart_id)
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id} in cart {cart_id}")))?;
        item.quantity = quantity;
        Ok(item.clone())
    }
}

struct MemoryCheckoutTx {
    state: Arc<RwLock<MemoryState>>,
    fail_item_at: Option<usize>,
    items: Vec<OrderItem>,
    header: Option<Order>,
}

#[async_trait]
impl CheckoutTx for MemoryCheckoutTx {
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        let position = self.items.len() + 1;
        if self.fail_item_at == Some(position) {
            return Err(StoreError::Unavailable(format!(
                "injected failure inserting order item {position}"
            )));
        }
        self.items.push(item.clone());
        Ok(())
    }

    async fn insert_order_header(&mut self, order: &Order) -> Result<()> {
        if self.header.is_some()
            || self
                .state
                .read()
                .await
                .orders
                .contains_key(&order.order_id)
        {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.order_id
            )));
        }
        self.header = Some(order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryCheckoutTx {
            state,
            items,
            header,
            ..
        } = *self;
        let header = header.ok_or(ValidationError::Required("order header"))?;

        let mut state = state.write().await;
        // Re-checked under the write lock: a concurrent checkout may have
        // committed the same order since the header was staged.
        if state.orders.contains_key(&header.order_id) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                header.order_id
            )));
        }

        for mut item in items {
            state.next_order_item_id += 1;
            item.item_id = state.next_order_item_id;
            state.order_items.push(item);
        }
        state.orders.insert(header.order_id.clone(), header);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>> {
        let fail_item_at = self.state.read().await.faults.fail_order_item_at;
        Ok(Box::new(MemoryCheckoutTx {
            state: Arc::clone(&self.state),
            fail_item_at,
            items: Vec::new(),
            header: None,
        }))
    }

    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(order_id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.state.read().await.orders.values().cloned().collect())
    }

    async fn list_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|item| &item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn count_orders(&self) -> Result<u64> {
        Ok(self.state.read().await.orders.len() as u64)
    }

    async fn update_order_field(
        &self,
        order_id: &OrderId,
        field: OrderField,
        value: &str,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.faults.fail_order_updates {
            return Err(StoreError::Unavailable(format!(
                "injected failure updating {field} of order {order_id}"
            )));
        }

        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        match field {
            OrderField::Status => order.status = value.into(),
            OrderField::PaymentId => order.payment_id = Some(value.to_string()),
            OrderField::Notes => order.notes = value.to_string(),
            OrderField::DeliveryAddress => order.delivery_address = value.to_string(),
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_products(&self, products: &[Product]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(taken) = products
            .iter()
            .find(|p| state.products.contains_key(&p.product_id))
        {
            return Err(StoreError::AllocationConflict {
                class: EntityClass::Products,
                id: taken.product_id.to_string(),
            });
        }
        for product in products {
            state
                .products
                .insert(product.product_id.clone(), product.clone());
        }
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.state.read().await.products.values().cloned().collect())
    }

    async fn products_by_category(&self, category: &str) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| p.category == category)
            .cloned()
            .collect())
    }

    async fn find_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(product_id).cloned())
    }

    async fn update_product_field(
        &self,
        product_id: &ProductId,
        field: ProductField,
        value: &str,
    ) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
        let slot = match field {
            ProductField::Image => &mut product.image,
            ProductField::Name => &mut product.name,
            ProductField::Description => &mut product.description,
            ProductField::Category => &mut product.category,
        };
        *slot = value.to_string();
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, product_id: &ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.products.remove(product_id).is_none() {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }
        state.prices.retain(|p| &p.product_id != product_id);
        Ok(())
    }

    async fn upsert_price(
        &self,
        product_id: &ProductId,
        size: &str,
        price: Money,
    ) -> Result<Price> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(product_id) {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }

        let now = Utc::now();
        if let Some(existing) = state
            .prices
            .iter_mut()
            .find(|p| &p.product_id == product_id && p.size == size)
        {
            existing.price = price;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        state.next_price_id += 1;
        let stored = Price {
            price_id: state.next_price_id,
            product_id: product_id.clone(),
            size: size.to_string(),
            price,
            created_at: now,
            updated_at: now,
        };
        state.prices.push(stored.clone());
        Ok(stored)
    }

    async fn update_price(
        &self,
        product_id: &ProductId,
        size: &str,
        price: Money,
    ) -> Result<Price> {
        let mut state = self.state.write().await;
        let existing = state
            .prices
            .iter_mut()
            .find(|p| &p.product_id == product_id && p.size == size)
            .ok_or_else(|| StoreError::NotFound(format!("price of {product_id} in {size}")))?;
        existing.price = price;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn list_prices(&self) -> Result<Vec<Price>> {
        Ok(self.state.read().await.prices.clone())
    }

    async fn find_price(&self, product_id: &ProductId, size: &str) -> Result<Option<Price>> {
        let state = self.state.read().await;
        Ok(state
            .prices
            .iter()
            .find(|p| &p.product_id == product_id && p.size == size)
            .cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::AllocationConflict {
                class: EntityClass::Users,
                id: user.id.to_string(),
            });
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                user.username
            )));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&session.user_id) {
            return Err(StoreError::NotFound(format!("user {}", session.user_id)));
        }
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.state.read().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        self.state.write().await.sessions.remove(token_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderDetails, OrderStatus};

    fn cart_id() -> CartId {
        CartId::parse("C000001").unwrap()
    }

    fn order_id() -> OrderId {
        OrderId::parse("O000001").unwrap()
    }

    fn new_item(product: &str, quantity: u32) -> NewCartItem {
        NewCartItem {
            cart_id: cart_id(),
            product_id: ProductId::parse(product).unwrap(),
            size: "regular".to_string(),
            unit_price: Money::from_cents(500),
            quantity,
            notes: String::new(),
        }
    }

    fn pending_order() -> Order {
        let details = OrderDetails {
            subtotal: Money::from_cents(1000),
            ..OrderDetails::default()
        };
        Order::pending(order_id(), &details, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_allocate_returns_pre_increment_values() {
        let store = InMemoryStore::new();

        assert_eq!(store.allocate(EntityClass::Users).await.unwrap(), 0);
        assert_eq!(store.allocate(EntityClass::Users).await.unwrap(), 1);
        assert_eq!(store.current(EntityClass::Users).await.unwrap(), 2);
        assert_eq!(store.current(EntityClass::Products).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_allocate_block_reserves_disjoint_ranges() {
        let store = InMemoryStore::new();

        let first = store
            .allocate_block(EntityClass::Products, 3)
            .await
            .unwrap();
        let second = store
            .allocate_block(EntityClass::Products, 2)
            .await
            .unwrap();

        assert_eq!(first, 0..3);
        assert_eq!(second, 3..5);
    }

    #[tokio::test]
    async fn test_allocate_block_rejects_zero() {
        let store = InMemoryStore::new();
        let result = store.allocate_block(EntityClass::Users, 0).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.current(EntityClass::Users).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cart_items_scoped_to_their_cart() {
        let store = InMemoryStore::new();
        let other = CartId::parse("C000002").unwrap();
        store.create_cart(&cart_id()).await.unwrap();
        store.create_cart(&other).await.unwrap();

        let item = store.add_item(new_item("0001", 1)).await.unwrap();

        let wrong_cart = store.remove_item(&other, item.item_id).await;
        assert!(matches!(wrong_cart, Err(StoreError::NotFound(_))));
        assert_eq!(store.list_items(&cart_id()).await.unwrap().len(), 1);

        store.remove_item(&cart_id(), item.item_id).await.unwrap();
        assert!(store.list_items(&cart_id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_item_requires_cart() {
        let store = InMemoryStore::new();
        let result = store.add_item(new_item("0001", 1)).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let store = InMemoryStore::new();
        store.create_cart(&cart_id()).await.unwrap();
        let item = store.add_item(new_item("0001", 1)).await.unwrap();

        let updated = store
            .update_quantity(&cart_id(), item.item_id, 4)
            .await
            .unwrap();
        assert_eq!(updated.quantity, 4);

        let result = store
            .update_quantity(&cart_id(), item.item_id, u32::MAX)
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_quantity_outside_column_range_is_rejected() {
        let store = InMemoryStore::new();
        store.create_cart(&cart_id()).await.unwrap();

        let result = store.add_item(new_item("0001", u32::MAX)).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.list_items(&cart_id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_tx_is_invisible_until_commit() {
        let store = InMemoryStore::new();
        let mut tx = store.begin_checkout().await.unwrap();

        let line = OrderItem {
            item_id: 0,
            order_id: order_id(),
            product_id: ProductId::parse("0001").unwrap(),
            size: "regular".to_string(),
            unit_price: Money::from_cents(500),
            quantity: 2,
            notes: String::new(),
        };
        tx.insert_order_item(&line).await.unwrap();
        tx.insert_order_header(&pending_order()).await.unwrap();

        assert!(store.find_order(&order_id()).await.unwrap().is_none());
        assert_eq!(store.order_item_count().await, 0);

        tx.commit().await.unwrap();

        assert!(store.find_order(&order_id()).await.unwrap().is_some());
        let items = store.list_order_items(&order_id()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, 1);
    }

    #[tokio::test]
    async fn test_dropped_checkout_tx_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin_checkout().await.unwrap();
            tx.insert_order_header(&pending_order()).await.unwrap();
        }
        assert_eq!(store.count_orders().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_commit_of_same_order_conflicts() {
        let store = InMemoryStore::new();

        let mut first = store.begin_checkout().await.unwrap();
        let mut second = store.begin_checkout().await.unwrap();
        first.insert_order_header(&pending_order()).await.unwrap();
        second.insert_order_header(&pending_order()).await.unwrap();

        first.commit().await.unwrap();
        let result = second.commit().await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.count_orders().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_injected_item_failure() {
        let store = InMemoryStore::new();
        store.fail_order_item_insert_at(Some(2)).await;

        let mut tx = store.begin_checkout().await.unwrap();
        let line = OrderItem::snapshot(
            &order_id(),
            &CartItem {
                item_id: 1,
                cart_id: cart_id(),
                product_id: ProductId::parse("0001").unwrap(),
                size: "regular".to_string(),
                unit_price: Money::from_cents(500),
                quantity: 1,
                notes: String::new(),
            },
        );
        assert!(tx.insert_order_item(&line).await.is_ok());
        assert!(matches!(
            tx.insert_order_item(&line).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_update_order_field() {
        let store = InMemoryStore::new();
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order_header(&pending_order()).await.unwrap();
        tx.commit().await.unwrap();

        let order = store
            .update_order_field(&order_id(), OrderField::PaymentId, "pay_0001")
            .await
            .unwrap();
        assert_eq!(order.payment_id.as_deref(), Some("pay_0001"));
        assert_eq!(order.status, OrderStatus::Pending);

        let order = store
            .update_order_field(&order_id(), OrderField::Status, "payment_failed")
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::PaymentFailed);

        let missing = store
            .update_order_field(
                &OrderId::parse("O999999").unwrap(),
                OrderField::Status,
                "paid",
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_prices_require_product() {
        let store = InMemoryStore::new();
        let product_id = ProductId::parse("0001").unwrap();

        let result = store
            .upsert_price(&product_id, "small", Money::from_cents(300))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let now = Utc::now();
        store
            .insert_products(&[Product {
                product_id: product_id.clone(),
                image: String::new(),
                name: "Latte".to_string(),
                description: String::new(),
                category: "coffee".to_string(),
                created_at: now,
                updated_at: now,
            }])
            .await
            .unwrap();

        let first = store
            .upsert_price(&product_id, "small", Money::from_cents(300))
            .await
            .unwrap();
        let second = store
            .upsert_price(&product_id, "small", Money::from_cents(350))
            .await
            .unwrap();
        assert_eq!(first.price_id, second.price_id);
        assert_eq!(store.list_prices().await.unwrap().len(), 1);

        store.delete_product(&product_id).await.unwrap();
        assert!(store.list_prices().await.unwrap().is_empty());
    }
}
