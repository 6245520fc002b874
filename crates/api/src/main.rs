//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use booking_store::{BookingStore, InMemoryBookingStore, PostgresBookingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{InMemoryPaymentProvider, PaymentProvider, StoreNotifier, StripeClient};
use sqlx::postgres::PgPoolOptions;
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

fn describe_metrics() {
    metrics::describe_counter!("checkout_sessions_total", "Checkout sessions opened, by purpose");
    metrics::describe_counter!("webhook_events_total", "Webhook deliveries, by outcome");
    metrics::describe_counter!(
        "inventory_decrements_total",
        "Departure capacity decrements, by result"
    );
    metrics::describe_counter!(
        "notifications_failed_total",
        "Agency notifications that could not be delivered"
    );
    metrics::describe_histogram!(
        "webhook_processing_seconds",
        metrics::Unit::Seconds,
        "Time spent processing one webhook delivery"
    );
}

fn payment_provider(config: &Config) -> Arc<dyn PaymentProvider> {
    match &config.stripe_secret_key {
        Some(secret_key) => {
            let client = StripeClient::new(
                secret_key.clone(),
                config.stripe_api_base.clone(),
                Duration::from_secs(config.provider_timeout_secs),
            )
            .expect("failed to build payment provider client");
            tracing::info!(api_base = %config.stripe_api_base, "using Stripe payment provider");
            Arc::new(client)
        }
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, using in-memory payment provider");
            Arc::new(InMemoryPaymentProvider::new())
        }
    }
}

/// Builds the application around `store` and serves it until shutdown.
async fn serve<S: BookingStore + 'static>(
    store: Arc<S>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let provider = payment_provider(config);
    let notifier = Arc::new(StoreNotifier::new(Arc::clone(&store)));
    let state = Arc::new(api::AppState::new(store, provider, notifier, config));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    // 3. Pick the store and serve
    match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect(database_url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresBookingStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres booking store");
            serve(Arc::new(store), &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory booking store");
            serve(Arc::new(InMemoryBookingStore::new()), &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
