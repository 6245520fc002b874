//! Payment-path error types.

use booking_store::StoreError;
use common::{DestinationId, ReservationId, TenantId};
use domain::{PricingError, ReservationError};
use thiserror::Error;

/// Errors raised while resolving the tenant of a request.
#[derive(Debug, Error)]
pub enum TenantError {
    /// No tenant matches the host or override id.
    #[error("Tenant not found: {0}")]
    NotFound(String),

    /// The tenant exists but is switched off.
    #[error("Tenant is inactive: {0}")]
    Inactive(TenantId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors returned by the payment provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with an error.
    #[error("Payment provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider did not answer within the configured timeout.
    #[error("Payment provider timed out")]
    Timeout,

    /// The request never reached the provider or the answer was unreadable.
    #[error("Payment provider transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Session metadata that breaks provider limits or cannot be read back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Too many metadata keys: {count} (max {max})")]
    TooManyKeys { count: usize, max: usize },

    #[error("Metadata key too long: {key}")]
    KeyTooLong { key: String },

    #[error("Metadata value too long for key {key}")]
    ValueTooLong { key: String },

    #[error("Missing metadata field: {0}")]
    Missing(&'static str),

    #[error("Invalid metadata field {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Errors raised while building a checkout or booking request.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// The tenant has a connected account that cannot take charges yet.
    #[error("Connected account for tenant {0} cannot accept charges")]
    ChargesDisabled(TenantId),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    Pricing(#[from] PricingError),

    #[error("Invalid booking: {0}")]
    Reservation(#[from] ReservationError),

    #[error("Invalid session metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Destination not found: {0}")]
    DestinationNotFound(DestinationId),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Rate limit exceeded: {limit} requests per minute")]
    RateLimited { limit: u32 },
}

/// Reasons a webhook signature is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No signature matches the payload")]
    Mismatch,
}

/// Errors raised while processing a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid webhook signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The store failed before the unit of work could commit.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WebhookError {
    /// Returns true if the provider should redeliver the event later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Store(err) if !err.is_rejection())
    }
}

/// Errors raised by a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_infrastructure_failures_are_retryable() {
        assert!(WebhookError::Store(StoreError::Unavailable("down".to_string())).is_retryable());
        assert!(
            !WebhookError::Store(StoreError::InsufficientCapacity {
                requested: 2,
                available: 1
            })
            .is_retryable()
        );
        assert!(!WebhookError::Signature(SignatureError::Mismatch).is_retryable());
    }
}
