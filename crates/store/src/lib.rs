//! Persistence for the storefront backend.
//!
//! Each entity family has its own async trait so services can depend on
//! exactly what they use. [`InMemoryStore`] backs tests and local runs;
//! [`PostgresStore`] is the production implementation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{
    CartStore, CatalogStore, CheckoutTx, CounterStore, OrderStore, SessionStore, Store, UserStore,
};
