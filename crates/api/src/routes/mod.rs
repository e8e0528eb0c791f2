//! HTTP route handlers, one module per resource.

pub mod carts;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod prices;
pub mod products;
pub mod users;
