//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use booking_store::BookingStore;
use payments::WebhookOutcome;
use serde::Serialize;

use super::header_str;
use crate::AppState;
use crate::error::ApiError;

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /webhooks/stripe: authenticated event delivery.
///
/// The body is taken raw because the signature covers the exact bytes sent.
/// No tenant resolution happens here; the tenant travels in session metadata.
#[tracing::instrument(skip_all, fields(payload_len = body.len()))]
pub async fn stripe<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let outcome = state.webhooks.handle(&body, signature).await?;

    let (reservation_id, reason) = match &outcome {
        WebhookOutcome::Applied { reservation_id } => (Some(reservation_id.to_string()), None),
        WebhookOutcome::Rejected { reason } => (None, Some(reason.clone())),
        WebhookOutcome::Duplicate | WebhookOutcome::Ignored => (None, None),
    };
    Ok(Json(WebhookResponse {
        received: true,
        outcome: outcome.as_str(),
        reservation_id,
        reason,
    }))
}
