//! Checkout orchestration.
//!
//! The checkout saga turns a cart into an order and hands the order total to
//! a payment processor:
//! 1. Validate the caller-supplied order details
//! 2. Snapshot the cart
//! 3. Materialize order items and 4. persist the order header, in one unit of work
//! 5. Open a payment session, bounded by a timeout
//! 6. Record the payment reference, or mark the order `payment_failed`
//!
//! A failure before step 5 leaves no trace. Orders left half-reconciled by a
//! failure in step 6 are reported by [`RecoveryScan`].

pub mod checkout;
pub mod error;
pub mod recovery;
pub mod services;
pub mod steps;

pub use checkout::{CheckoutOutcome, CheckoutSaga, DEFAULT_PAYMENT_TIMEOUT};
pub use error::{CheckoutError, PaymentError};
pub use recovery::{InconsistencyReason, InconsistentOrder, RecoveryScan};
pub use services::{
    DEFAULT_STRIPE_API_BASE, InMemoryPaymentGateway, PaymentGateway, PaymentSession,
    StripeConfig, StripePaymentGateway,
};
pub use steps::CheckoutStep;
