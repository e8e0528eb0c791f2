//! Payment gateway trait and implementations.

pub mod payment;
pub mod stripe;

pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentSession};
pub use stripe::{DEFAULT_STRIPE_API_BASE, StripeConfig, StripePaymentGateway};
