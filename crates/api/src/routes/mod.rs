//! HTTP handlers and the request plumbing they share.

pub mod checkout;
pub mod departures;
pub mod health;
pub mod metrics;
pub mod reservations;
pub mod webhooks;

use std::str::FromStr;

use axum::http::HeaderMap;
use axum::http::header::HOST;
use booking_store::BookingStore;
use common::TenantId;
use domain::Tenant;
use payments::{CheckoutError, RateDecision};

use crate::AppState;
use crate::error::ApiError;

/// Header carrying an explicit tenant id.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolves the tenant of a request.
///
/// A `tenant_id` from the body wins over the `X-Tenant-Id` header; both are
/// overrides and only count when the deployment allows them. Otherwise the
/// `Host` header decides.
pub(crate) async fn resolve_tenant<S: BookingStore>(
    state: &AppState<S>,
    headers: &HeaderMap,
    body_tenant: Option<TenantId>,
) -> Result<Tenant, ApiError> {
    let override_id = match body_tenant {
        Some(id) => Some(id),
        None => header_str(headers, TENANT_HEADER)
            .map(|raw| parse_id::<TenantId>("tenant id", raw))
            .transpose()?,
    };
    let host = header_str(headers, HOST.as_str());
    Ok(state.tenants.resolve(host, override_id).await?)
}

/// Counts the request against the caller's per-minute budget.
pub(crate) async fn enforce_rate_limit<S: BookingStore>(
    state: &AppState<S>,
    headers: &HeaderMap,
    tenant: &Tenant,
    action: &str,
) -> Result<(), ApiError> {
    let key = format!("{action}:{}:{}", tenant.id, client_key(headers));
    match state.rate_limiter.check(&key).await? {
        RateDecision::Allowed { .. } => Ok(()),
        RateDecision::Limited { limit } => {
            tracing::warn!(tenant_id = %tenant.id, action, "rate limit exceeded");
            Err(CheckoutError::RateLimited { limit }.into())
        }
    }
}

/// Identifies the caller by the first `X-Forwarded-For` hop.
fn client_key(headers: &HeaderMap) -> &str {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("anonymous")
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub(crate) fn parse_id<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn client_key_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "anonymous");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn parse_id_reports_bad_input() {
        assert!(parse_id::<TenantId>("tenant id", "nope").is_err());
        let id = TenantId::new();
        assert_eq!(parse_id::<TenantId>("tenant id", &id.to_string()).unwrap(), id);
    }
}
