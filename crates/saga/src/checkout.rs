//! The checkout saga.

use std::time::{Duration, Instant};

use chrono::Utc;
use common::{CartId, CartItem, Order, OrderDetails, OrderField, OrderId, OrderItem, OrderStatus};
use serde::{Deserialize, Serialize};
use store::{CartStore, OrderStore, StoreError};

use crate::error::{CheckoutError, PaymentError};
use crate::services::payment::{PaymentGateway, PaymentSession};
use crate::steps::CheckoutStep;

/// Upper bound on one payment session request.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a checkout that reached the payment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub checkout_url: Option<String>,
}

fn failed_at(step: CheckoutStep) -> impl FnOnce(StoreError) -> CheckoutError {
    move |source| CheckoutError::Storage { step, source }
}

/// Turns a cart into an order and hands its total to a payment gateway.
///
/// The order items and header are written in one unit of work, so a
/// checkout that fails before payment leaves nothing behind and can be
/// retried. The payment call happens after commit with no lock held.
pub struct CheckoutSaga<S, P> {
    store: S,
    payment: P,
    payment_timeout: Duration,
}

impl<S, P> CheckoutSaga<S, P>
where
    S: CartStore + OrderStore,
    P: PaymentGateway,
{
    /// Creates a new checkout saga.
    pub fn new(store: S, payment: P) -> Self {
        Self {
            store,
            payment,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
        }
    }

    /// Sets the upper bound on the payment session request.
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    /// Checks out `cart_id` into its derived order.
    ///
    /// A declined or timed-out payment still returns `Ok`, with status
    /// `payment_failed`.
    #[tracing::instrument(skip(self, details), fields(cart_id = %cart_id, order_id))]
    pub async fn checkout(
        &self,
        cart_id: &CartId,
        details: OrderDetails,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        metrics::counter!("checkout_total").increment(1);
        let started = Instant::now();

        let order_id = OrderId::for_cart(cart_id);
        tracing::Span::current().record("order_id", tracing::field::display(&order_id));

        let result = self.run(cart_id, order_id, details).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => {
                tracing::info!(status = %outcome.status, "Checkout finished");
            }
            Err(e) => {
                let step = e.step().map(|s| s.as_str()).unwrap_or("validate");
                metrics::counter!("checkout_errors_total", "step" => step).increment(1);
                tracing::warn!(error = %e, step, "Checkout aborted");
            }
        }
        result
    }

    async fn run(
        &self,
        cart_id: &CartId,
        order_id: OrderId,
        details: OrderDetails,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        tracing::debug!(step = %CheckoutStep::Validate, "checkout step started");
        details.validate()?;
        if self
            .store
            .find_order(&order_id)
            .await
            .map_err(failed_at(CheckoutStep::Validate))?
            .is_some()
        {
            return Err(CheckoutError::AlreadyCheckedOut(order_id));
        }

        tracing::debug!(step = %CheckoutStep::Snapshot, "checkout step started");
        let snapshot = self.snapshot(cart_id).await?;

        let order = Order::pending(order_id.clone(), &details, Utc::now())?;
        self.persist(&order, &snapshot).await?;
        tracing::info!(
            items = snapshot.len(),
            total = %order.total_price,
            "Order persisted"
        );

        tracing::debug!(step = %CheckoutStep::RequestPayment, "checkout step started");
        let payment = self.request_payment(&order).await;

        tracing::debug!(step = %CheckoutStep::RecordOutcome, "checkout step started");
        self.record_outcome(order_id, payment).await
    }

    /// Reads the cart once into an owned list. Later cart edits do not
    /// reach the order.
    async fn snapshot(&self, cart_id: &CartId) -> Result<Vec<CartItem>, CheckoutError> {
        let step = CheckoutStep::Snapshot;
        if !self
            .store
            .cart_exists(cart_id)
            .await
            .map_err(failed_at(step))?
        {
            return Err(CheckoutError::CartNotFound(cart_id.clone()));
        }

        let items = self
            .store
            .list_items(cart_id)
            .await
            .map_err(failed_at(step))?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart(cart_id.clone()));
        }
        Ok(items)
    }

    /// Writes every order item, then the header, then commits.
    ///
    /// Returning early drops the unit of work, which discards the writes.
    async fn persist(&self, order: &Order, snapshot: &[CartItem]) -> Result<(), CheckoutError> {
        tracing::debug!(step = %CheckoutStep::MaterializeItems, "checkout step started");
        let mut tx = self
            .store
            .begin_checkout()
            .await
            .map_err(failed_at(CheckoutStep::MaterializeItems))?;

        for item in snapshot {
            tx.insert_order_item(&OrderItem::snapshot(&order.order_id, item))
                .await
                .map_err(failed_at(CheckoutStep::MaterializeItems))?;
        }

        tracing::debug!(step = %CheckoutStep::PersistHeader, "checkout step started");
        let header_failed = |source: StoreError| match source {
            StoreError::Conflict(_) => CheckoutError::AlreadyCheckedOut(order.order_id.clone()),
            source => CheckoutError::Storage {
                step: CheckoutStep::PersistHeader,
                source,
            },
        };
        tx.insert_order_header(order).await.map_err(header_failed)?;
        tx.commit().await.map_err(header_failed)
    }

    async fn request_payment(&self, order: &Order) -> Result<PaymentSession, PaymentError> {
        let request = self.payment.open_session(&order.order_id, order.total_price);
        match tokio::time::timeout(self.payment_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(PaymentError::Timeout(self.payment_timeout)),
        }
    }

    async fn record_outcome(
        &self,
        order_id: OrderId,
        payment: Result<PaymentSession, PaymentError>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let step = CheckoutStep::RecordOutcome;
        match payment {
            Ok(session) => {
                self.store
                    .update_order_field(&order_id, OrderField::PaymentId, &session.reference)
                    .await
                    .map_err(failed_at(step))?;

                Ok(CheckoutOutcome {
                    order_id,
                    status: OrderStatus::Pending,
                    payment_id: Some(session.reference),
                    checkout_url: session.checkout_url,
                })
            }
            Err(e) => {
                metrics::counter!("checkout_payment_failed_total").increment(1);
                tracing::warn!(error = %e, "Payment session not opened");

                let status = OrderStatus::PaymentFailed;
                self.store
                    .update_order_field(&order_id, OrderField::Status, status.as_str())
                    .await
                    .map_err(failed_at(step))?;

                Ok(CheckoutOutcome {
                    order_id,
                    status,
                    payment_id: None,
                    checkout_url: None,
                })
            }
        }
    }
}
