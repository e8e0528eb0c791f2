//! Integration tests for the checkout saga.

use std::sync::Arc;

use async_trait::async_trait;
use common::{
    CartId, Money, NewCartItem, OrderDetails, OrderId, OrderStatus, ProductId,
};
use saga::{
    CheckoutError, CheckoutSaga, CheckoutStep, InMemoryPaymentGateway, PaymentError,
    PaymentGateway, PaymentSession, RecoveryScan,
};
use store::{CartStore, InMemoryStore, OrderStore};

/// Gateway that always answers with the same reference.
struct FixedReferenceGateway(&'static str);

#[async_trait]
impl PaymentGateway for FixedReferenceGateway {
    async fn open_session(
        &self,
        _order_id: &OrderId,
        _amount: Money,
    ) -> Result<PaymentSession, PaymentError> {
        Ok(PaymentSession {
            reference: self.0.to_string(),
            checkout_url: None,
        })
    }
}

/// Gateway that edits the cart while the payment call is in flight.
struct CartMutatingGateway {
    store: InMemoryStore,
    cart_id: CartId,
}

#[async_trait]
impl PaymentGateway for CartMutatingGateway {
    async fn open_session(
        &self,
        _order_id: &OrderId,
        _amount: Money,
    ) -> Result<PaymentSession, PaymentError> {
        let items = self.store.list_items(&self.cart_id).await.unwrap();
        self.store
            .update_quantity(&self.cart_id, items[0].item_id, 99)
            .await
            .unwrap();
        self.store
            .add_item(line(&self.cart_id, 7, 999))
            .await
            .unwrap();
        Ok(PaymentSession {
            reference: "ref-mutated".to_string(),
            checkout_url: None,
        })
    }
}

fn line(cart_id: &CartId, product: u64, cents: i64) -> NewCartItem {
    NewCartItem {
        cart_id: cart_id.clone(),
        product_id: ProductId::from_sequence(product),
        size: "regular".to_string(),
        unit_price: Money::from_cents(cents),
        quantity: 2,
        notes: format!("line {product}"),
    }
}

async fn filled_cart(store: &InMemoryStore) -> CartId {
    let cart_id = CartId::parse("C000001").unwrap();
    store.create_cart(&cart_id).await.unwrap();
    store.add_item(line(&cart_id, 0, 300)).await.unwrap();
    store.add_item(line(&cart_id, 1, 200)).await.unwrap();
    cart_id
}

fn details() -> OrderDetails {
    OrderDetails {
        is_delivery: true,
        delivery_address: "1 Main St".to_string(),
        subtotal: Money::from_cents(1000),
        delivery_fee: Money::from_cents(250),
        ..OrderDetails::default()
    }
}

#[tokio::test]
async fn gateway_reference_becomes_payment_id() {
    let store = InMemoryStore::new();
    let cart_id = filled_cart(&store).await;
    let saga = CheckoutSaga::new(store.clone(), FixedReferenceGateway("ref-123"));

    let outcome = saga.checkout(&cart_id, details()).await.unwrap();

    assert_eq!(outcome.payment_id.as_deref(), Some("ref-123"));
    let order = store.find_order(&outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_id.as_deref(), Some("ref-123"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.tax.cents(), 163);
    assert_eq!(order.total_price.cents(), 1163);
}

#[tokio::test]
async fn order_items_are_a_snapshot_of_the_cart() {
    let store = InMemoryStore::new();
    let cart_id = filled_cart(&store).await;
    let before = store.list_items(&cart_id).await.unwrap();
    let gateway = CartMutatingGateway {
        store: store.clone(),
        cart_id: cart_id.clone(),
    };
    let saga = CheckoutSaga::new(store.clone(), gateway);

    let outcome = saga.checkout(&cart_id, details()).await.unwrap();

    let items = store.list_order_items(&outcome.order_id).await.unwrap();
    assert_eq!(items.len(), before.len());
    for (order_item, cart_item) in items.iter().zip(&before) {
        assert!(order_item.matches(cart_item));
    }
    assert_eq!(store.list_items(&cart_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn failed_item_insert_leaves_nothing_and_retry_is_clean() {
    let store = InMemoryStore::new();
    let cart_id = filled_cart(&store).await;
    let saga = CheckoutSaga::new(store.clone(), InMemoryPaymentGateway::new());

    store.fail_order_item_insert_at(Some(2)).await;
    let err = saga.checkout(&cart_id, details()).await.unwrap_err();
    assert_eq!(err.step(), Some(CheckoutStep::MaterializeItems));

    let order_id = OrderId::for_cart(&cart_id);
    assert!(store.find_order(&order_id).await.unwrap().is_none());
    assert_eq!(store.order_item_count().await, 0);

    store.fail_order_item_insert_at(None).await;
    let outcome = saga.checkout(&cart_id, details()).await.unwrap();

    assert_eq!(outcome.status, OrderStatus::Pending);
    assert_eq!(store.list_order_items(&order_id).await.unwrap().len(), 2);
    assert_eq!(store.order_item_count().await, 2);
}

#[tokio::test]
async fn repeat_checkout_is_rejected_without_writes() {
    let store = InMemoryStore::new();
    let cart_id = filled_cart(&store).await;
    let gateway = InMemoryPaymentGateway::new();
    let saga = CheckoutSaga::new(store.clone(), gateway.clone());

    saga.checkout(&cart_id, details()).await.unwrap();
    let result = saga.checkout(&cart_id, details()).await;

    assert!(matches!(result, Err(CheckoutError::AlreadyCheckedOut(_))));
    assert_eq!(store.count_orders().await.unwrap(), 1);
    assert_eq!(store.order_item_count().await, 2);
    assert_eq!(gateway.session_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_of_one_cart_create_one_order() {
    let store = InMemoryStore::new();
    let cart_id = filled_cart(&store).await;
    let gateway = InMemoryPaymentGateway::new();
    let saga = Arc::new(CheckoutSaga::new(store.clone(), gateway.clone()));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let saga = Arc::clone(&saga);
            let cart_id = cart_id.clone();
            tokio::spawn(async move { saga.checkout(&cart_id, details()).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(CheckoutError::AlreadyCheckedOut(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(store.count_orders().await.unwrap(), 1);
    assert_eq!(store.order_item_count().await, 2);
    assert_eq!(gateway.session_count().await, 1);
}

#[tokio::test]
async fn interrupted_reconciliation_is_found_by_recovery_scan() {
    let store = InMemoryStore::new();
    let cart_id = filled_cart(&store).await;
    let saga = CheckoutSaga::new(store.clone(), InMemoryPaymentGateway::new());

    store.fail_order_updates(true).await;
    let err = saga.checkout(&cart_id, details()).await.unwrap_err();
    assert_eq!(err.step(), Some(CheckoutStep::RecordOutcome));

    let found = RecoveryScan::new(store.clone()).scan().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].order_id, OrderId::for_cart(&cart_id));
}
