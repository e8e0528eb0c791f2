//! Payment gateway trait and in-memory implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PaymentError;

/// Hosted payment session opened for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Processor-side reference stored as the order's `payment_id`.
    pub reference: String,
    /// Where the customer completes payment, if the processor hosts a page.
    pub checkout_url: Option<String>,
}

/// Trait for handing an order total to a payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session for `amount`, which must be positive.
    async fn open_session(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentSession, PaymentError>;
}

#[async_trait]
impl<P: PaymentGateway + ?Sized> PaymentGateway for Arc<P> {
    async fn open_session(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentSession, PaymentError> {
        (**self).open_session(order_id, amount).await
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    sessions: Vec<(OrderId, Money, String)>,
    next_id: u32,
    decline: bool,
    latency: Option<Duration>,
}

/// In-memory payment gateway for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following session request fail with a decline.
    pub async fn set_decline(&self, decline: bool) {
        self.state.lock().await.decline = decline;
    }

    /// Delays every following session request.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// Returns the number of sessions opened.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Returns the amount of the session opened for `order_id`, if any.
    pub async fn amount_for(&self, order_id: &OrderId) -> Option<Money> {
        self.state
            .lock()
            .await
            .sessions
            .iter()
            .find(|(id, _, _)| id == order_id)
            .map(|(_, amount, _)| *amount)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn open_session(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentSession, PaymentError> {
        let amount = amount
            .ensure_positive()
            .map_err(|_| PaymentError::InvalidAmount(amount))?;

        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        if state.decline {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        state.next_id += 1;
        let reference = format!("pay_{:04}", state.next_id);
        state
            .sessions
            .push((order_id.clone(), amount, reference.clone()));

        Ok(PaymentSession {
            checkout_url: Some(format!("https://checkout.invalid/pay/{reference}")),
            reference,
        })
    }
}
