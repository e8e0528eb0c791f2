//! Checkout and payment error types.

use std::time::Duration;

use common::{CartId, Money, OrderId, ValidationError};
use store::StoreError;
use thiserror::Error;

use crate::steps::CheckoutStep;

/// Errors that end a checkout without an outcome.
///
/// A declined payment is not an error: it is the `payment_failed` outcome.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Order details failed validation. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// The cart has no lines. Nothing was written.
    #[error("Cart {0} is empty")]
    EmptyCart(CartId),

    /// An order already exists for this cart.
    #[error("Cart has already been checked out into order {0}")]
    AlreadyCheckedOut(OrderId),

    /// Storage failed during `step`.
    #[error("Checkout step '{step}' failed: {source}")]
    Storage {
        step: CheckoutStep,
        #[source]
        source: StoreError,
    },
}

impl CheckoutError {
    /// Step the checkout stopped in, for storage failures.
    pub fn step(&self) -> Option<CheckoutStep> {
        match self {
            CheckoutError::Storage { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Errors from a payment gateway. The saga treats all of them as a decline.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment amount must be positive, got {0}")]
    InvalidAmount(Money),

    #[error("Payment processor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment processor rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Payment processor response carried no session reference")]
    MissingReference,

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment processor did not answer within {0:?}")]
    Timeout(Duration),
}
