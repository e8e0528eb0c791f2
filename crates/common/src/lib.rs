//! Shared types for the storefront backend.
//!
//! Identifiers, money, persisted records, and the field allow-lists used by
//! every other crate in the workspace.

pub mod error;
pub mod fields;
pub mod model;
pub mod money;
pub mod types;

pub use error::ValidationError;
pub use fields::{OrderField, ProductField};
pub use model::{
    CartItem, MAX_ITEM_QUANTITY, NewCartItem, NewProduct, Order, OrderDetails, OrderItem,
    OrderStatus, Price, Product, Session, User, validate_quantity,
};
pub use money::{MAX_AMOUNT_CENTS, Money};
pub use types::{CartId, EntityClass, OrderId, ProductId, UserId};
