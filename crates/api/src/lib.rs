//! HTTP API server for the multi-tenant booking engine.
//!
//! Exposes checkout, request-to-book, reservation payment and availability
//! endpoints plus the payment-provider webhook, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use booking_store::{BookingStore, InventoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{
    CheckoutService, CheckoutSettings, NotificationDispatcher, Notifier, PaymentProvider,
    RateLimiter, TenantResolver, WebhookProcessor, WebhookVerifier,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BookingStore> {
    pub store: Arc<S>,
    pub tenants: TenantResolver<S>,
    pub checkout: CheckoutService<S>,
    pub webhooks: WebhookProcessor<S>,
    pub ledger: InventoryLedger<S>,
    pub rate_limiter: RateLimiter<S>,
}

impl<S: BookingStore> AppState<S> {
    /// Wires the services around one store.
    ///
    /// Without a configured webhook secret a random one is generated, so
    /// every delivery fails verification instead of accepting forged events.
    pub fn new(
        store: Arc<S>,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let webhook_secret = config.stripe_webhook_secret.clone().unwrap_or_else(|| {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook deliveries will be rejected");
            uuid::Uuid::new_v4().to_string()
        });

        let settings = CheckoutSettings {
            currency: config.checkout_currency.clone(),
            public_base_url: config.public_base_url.clone(),
        };

        Self {
            tenants: TenantResolver::new(Arc::clone(&store), config.allow_tenant_override),
            checkout: CheckoutService::new(Arc::clone(&store), provider, settings),
            webhooks: WebhookProcessor::new(
                Arc::clone(&store),
                WebhookVerifier::new(webhook_secret, config.webhook_tolerance_secs),
                NotificationDispatcher::new(notifier),
            ),
            ledger: InventoryLedger::new(Arc::clone(&store)),
            rate_limiter: RateLimiter::new(Arc::clone(&store), config.rate_limit_per_minute),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookingStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/bookings", post(routes::checkout::request_to_book::<S>))
        .route(
            "/reservations/{id}/payment",
            post(routes::reservations::payment::<S>),
        )
        .route(
            "/reservations/{id}/remaining-payment",
            post(routes::reservations::remaining_payment::<S>),
        )
        .route(
            "/departures/{destination_id}/{date}",
            get(routes::departures::get::<S>),
        )
        .route("/webhooks/stripe", post(routes::webhooks::stripe::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
