//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking_store::StoreError;
use payments::{CheckoutError, ProviderError, TenantError, WebhookError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Tenant resolution failed.
    Tenant(TenantError),
    /// Checkout or booking request failed.
    Checkout(CheckoutError),
    /// Webhook delivery could not be processed.
    Webhook(WebhookError),
    /// Store error outside of a checkout.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Tenant(err) => tenant_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Webhook(err) => webhook_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, %status, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn tenant_error_to_response(err: TenantError) -> (StatusCode, String) {
    match err {
        TenantError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        TenantError::Inactive(_) => (StatusCode::UNAUTHORIZED, err.to_string()),
        TenantError::Store(store) => store_error_to_response(store),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::Tenant(tenant) => tenant_error_to_response(tenant),
        CheckoutError::Store(store) => store_error_to_response(store),
        CheckoutError::Provider(ProviderError::Timeout) => {
            (StatusCode::GATEWAY_TIMEOUT, ProviderError::Timeout.to_string())
        }
        CheckoutError::Provider(provider) => {
            (StatusCode::INTERNAL_SERVER_ERROR, provider.to_string())
        }
        CheckoutError::ChargesDisabled(_)
        | CheckoutError::Validation(_)
        | CheckoutError::Pricing(_)
        | CheckoutError::Reservation(_)
        | CheckoutError::Metadata(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::DestinationNotFound(_) | CheckoutError::ReservationNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
    }
}

fn webhook_error_to_response(err: WebhookError) -> (StatusCode, String) {
    match err {
        WebhookError::Signature(_) | WebhookError::MalformedPayload(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        WebhookError::Store(_) if err.is_retryable() => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        WebhookError::Store(store) => store_error_to_response(store),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::UnknownDeparture { .. } | StoreError::ReservationNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        StoreError::InsufficientCapacity { .. } => (StatusCode::CONFLICT, err.to_string()),
        StoreError::Reservation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::Unavailable(_) | StoreError::Database(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        StoreError::Corrupt(_) | StoreError::Migration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        ApiError::Tenant(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::Webhook(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use payments::SignatureError;

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn checkout_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(CheckoutError::Validation("bad".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::RateLimited { limit: 30 }.into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(
                CheckoutError::Store(StoreError::InsufficientCapacity {
                    requested: 4,
                    available: 2
                })
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CheckoutError::Provider(ProviderError::Timeout).into()),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn tenant_errors() {
        assert_eq!(
            status_of(TenantError::NotFound("unknown.example".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(TenantError::Inactive(common::TenantId::new()).into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn webhook_errors_separate_integrity_from_outages() {
        assert_eq!(
            status_of(WebhookError::Signature(SignatureError::Mismatch).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(WebhookError::Store(StoreError::Unavailable("down".to_string())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
