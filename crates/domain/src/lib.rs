//! Domain services for the storefront backend.
//!
//! This crate sits between the HTTP layer and storage:
//! - [`IdAllocator`] mints user and product identifiers from the shared counter
//! - [`CartService`], [`CatalogService`] and [`OrderService`] wrap the stores
//!   with validation and lookups
//! - [`auth`] handles registration, login and bearer-token authentication

pub mod allocator;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;

pub use allocator::IdAllocator;
pub use auth::{
    AuthService, Authenticator, LoginResponse, Registered, Registration, TokenAuthenticator,
};
pub use cart::{AddCartItem, CartService};
pub use catalog::CatalogService;
pub use error::DomainError;
pub use order::{OrderService, OrderWithItems};
