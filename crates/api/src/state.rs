//! Shared application state.

use std::sync::Arc;

use domain::{AuthService, Authenticator, CartService, CatalogService, OrderService};
use saga::{CheckoutSaga, PaymentGateway, RecoveryScan};
use store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub auth: AuthService<S>,
    pub authenticator: Arc<dyn Authenticator>,
    pub carts: CartService<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    pub checkout: CheckoutSaga<S, Arc<dyn PaymentGateway>>,
    pub recovery: RecoveryScan<S>,
}
