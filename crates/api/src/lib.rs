//! HTTP API server with observability for the storefront backend.
//!
//! Provides REST endpoints for accounts, the catalog, carts, checkout and
//! order administration, with structured logging (tracing) and Prometheus
//! metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use domain::{AuthService, CartService, CatalogService, OrderService, TokenAuthenticator};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{CheckoutSaga, PaymentGateway, RecoveryScan};
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Accounts
        .route("/users", post(routes::users::register::<S>))
        .route("/login", post(routes::users::login::<S>))
        .route("/logout", post(routes::users::logout::<S>))
        .route("/validate_admin", get(routes::users::validate_admin))
        // Catalog
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/category/{category}",
            get(routes::products::by_category::<S>),
        )
        .route(
            "/products/{product_id}",
            get(routes::products::get::<S>).delete(routes::products::delete::<S>),
        )
        .route(
            "/products/{product_id}/{field}",
            put(routes::products::update_field::<S>),
        )
        .route(
            "/prices",
            get(routes::prices::list::<S>).post(routes::prices::create::<S>),
        )
        .route(
            "/prices/{product_id}/{size}/{price}",
            put(routes::prices::update::<S>),
        )
        // Carts and checkout
        .route(
            "/carts/{cart_id}/items",
            get(routes::carts::list_items::<S>).post(routes::carts::add_item::<S>),
        )
        .route(
            "/carts/{cart_id}/items/{item_id}",
            delete(routes::carts::remove_item::<S>),
        )
        .route(
            "/carts/{cart_id}/items/{item_id}/{quantity}",
            put(routes::carts::update_quantity::<S>),
        )
        .route(
            "/carts/{cart_id}/checkout",
            post(routes::checkout::checkout::<S>),
        )
        // Orders
        .route("/orders/count", get(routes::orders::count::<S>))
        .route(
            "/orders/inconsistent",
            get(routes::orders::inconsistent::<S>),
        )
        .route("/orders/{order_id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{order_id}/{field}",
            put(routes::orders::update_field::<S>),
        )
        .route(
            "/orders/{order_id}/status/{status}",
            put(routes::orders::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(cors_layer(config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            tracing::warn!("CORS_ORIGIN is not a valid header value, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Creates the application state over `store`, with bearer tokens checked
/// against the same store.
pub fn create_default_state<S: Store>(
    store: S,
    payment: Arc<dyn PaymentGateway>,
    config: &Config,
) -> Arc<AppState<S>> {
    let checkout =
        CheckoutSaga::new(store.clone(), payment).with_payment_timeout(config.payment_timeout);

    Arc::new(AppState {
        auth: AuthService::new(store.clone(), config.token_ttl()),
        authenticator: Arc::new(TokenAuthenticator::new(store.clone())),
        carts: CartService::new(store.clone()),
        catalog: CatalogService::new(store.clone()),
        orders: OrderService::new(store.clone()),
        recovery: RecoveryScan::new(store),
        checkout,
    })
}
