//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryPaymentGateway, PaymentGateway, StripePaymentGateway};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn payment_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match config.stripe() {
        Some(stripe) => {
            tracing::info!(api_base = %stripe.api_base, "using Stripe payment gateway");
            Arc::new(StripePaymentGateway::new(stripe))
        }
        None => {
            tracing::warn!("STRIPE_API_KEY not set, using in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    }
}

async fn serve<S: Store>(store: S, config: Config, metrics_handle: PrometheusHandle) {
    let state = api::create_default_state(store, payment_gateway(&config), &config);

    if let Some((username, password)) = config.admin_credentials() {
        match state
            .auth
            .bootstrap_admin(username, password)
            .await
            .expect("failed to bootstrap administrator")
        {
            Some(admin) => tracing::info!(user_id = %admin.user_id, "administrator created"),
            None => tracing::info!("administrator already present"),
        }
    }

    let app = api::create_app(state, metrics_handle, &config);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let _env = dotenvy::dotenv();
    let config = Config::from_env();

    // 2. Initialize tracing
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    // 3. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the store and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle).await;
        }
    }
}
