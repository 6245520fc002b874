//! Payment path of the booking engine.
//!
//! - [`TenantResolver`] maps a request to exactly one tenant
//! - [`CheckoutService`] prices bookings and opens provider checkout sessions
//! - [`WebhookProcessor`] reconciles provider events with reservations and inventory
//! - [`NotificationDispatcher`] tells agencies what happened, best effort
//!
//! The payment provider is behind the [`PaymentProvider`] trait, with an
//! in-memory fake for tests and a Stripe client for production.

pub mod checkout;
pub mod error;
pub mod metadata;
pub mod notify;
pub mod provider;
pub mod rate_limit;
pub mod signature;
pub mod tenant;
pub mod webhook;

pub use checkout::{BookingRequest, CheckoutRedirect, CheckoutService, CheckoutSettings};
pub use error::{
    CheckoutError, MetadataError, NotifyError, ProviderError, SignatureError, TenantError,
    WebhookError,
};
pub use metadata::{CheckoutPurpose, SessionMetadata};
pub use notify::{InMemoryNotifier, NotificationDispatcher, Notifier, StoreNotifier};
pub use provider::{
    CheckoutSession, CheckoutSessionParams, InMemoryPaymentProvider, PaymentProvider,
    ProviderFailure, STRIPE_API_BASE, StripeClient,
};
pub use rate_limit::{RateDecision, RateLimiter};
pub use signature::{DEFAULT_TOLERANCE_SECS, WebhookVerifier};
pub use tenant::{TenantResolver, normalize_host};
pub use webhook::{WebhookOutcome, WebhookProcessor};
