//! Payment endpoints for existing reservations.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use booking_store::BookingStore;
use common::ReservationId;

use super::checkout::CheckoutResponse;
use super::{enforce_rate_limit, parse_id, resolve_tenant};
use crate::AppState;
use crate::error::ApiError;

/// POST /reservations/{id}/payment: deposit or full payment of a reservation.
#[tracing::instrument(skip(state, headers))]
pub async fn payment<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let reservation_id: ReservationId = parse_id("reservation id", &id)?;
    let tenant = resolve_tenant(&state, &headers, None).await?;
    enforce_rate_limit(&state, &headers, &tenant, "checkout").await?;

    let redirect = state
        .checkout
        .create_reservation_checkout(&tenant, reservation_id)
        .await?;
    Ok(Json(CheckoutResponse {
        redirect_url: redirect.redirect_url,
        session_id: redirect.session_id,
    }))
}

/// POST /reservations/{id}/remaining-payment: balance of a deposit booking.
#[tracing::instrument(skip(state, headers))]
pub async fn remaining_payment<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let reservation_id: ReservationId = parse_id("reservation id", &id)?;
    let tenant = resolve_tenant(&state, &headers, None).await?;
    enforce_rate_limit(&state, &headers, &tenant, "checkout").await?;

    let redirect = state
        .checkout
        .create_remaining_checkout(&tenant, reservation_id)
        .await?;
    Ok(Json(CheckoutResponse {
        redirect_url: redirect.redirect_url,
        session_id: redirect.session_id,
    }))
}
