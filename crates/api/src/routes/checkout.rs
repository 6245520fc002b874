//! Checkout and request-to-book endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use booking_store::BookingStore;
use chrono::NaiveDate;
use common::{DestinationId, TenantId};
use domain::{PartySize, Traveler};
use payments::BookingRequest;
use serde::{Deserialize, Serialize};

use super::{enforce_rate_limit, resolve_tenant};
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct TravelerBody {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartyBody {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub destination_id: DestinationId,
    pub departure_date: NaiveDate,
    pub traveler: TravelerBody,
    pub party_size: PartyBody,
    /// Total in major units.
    pub total: f64,
    #[serde(default)]
    pub deposit_amount: Option<f64>,
}

impl CheckoutBody {
    fn into_request(self) -> BookingRequest {
        BookingRequest {
            destination_id: self.destination_id,
            departure_date: self.departure_date,
            traveler: Traveler::new(self.traveler.name, self.traveler.email, self.traveler.phone),
            party: PartySize::new(self.party_size.adults, self.party_size.children),
            total: self.total,
            deposit_amount: self.deposit_amount,
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub redirect_url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct BookingCreatedResponse {
    pub reservation_id: String,
    pub status: String,
    pub booking_model: String,
}

// -- Handlers --

/// POST /checkout: opens a provider session for immediate payment.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let tenant = resolve_tenant(&state, &headers, body.tenant_id).await?;
    enforce_rate_limit(&state, &headers, &tenant, "checkout").await?;

    let redirect = state
        .checkout
        .create_checkout(&tenant, body.into_request())
        .await?;

    Ok(Json(CheckoutResponse {
        redirect_url: redirect.redirect_url,
        session_id: redirect.session_id,
    }))
}

/// POST /bookings: records a reservation awaiting agency confirmation.
#[tracing::instrument(skip(state, headers, body))]
pub async fn request_to_book<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<BookingCreatedResponse>), ApiError> {
    let tenant = resolve_tenant(&state, &headers, body.tenant_id).await?;
    enforce_rate_limit(&state, &headers, &tenant, "booking").await?;

    let reservation = state
        .checkout
        .request_to_book(&tenant, body.into_request())
        .await?;

    let response = BookingCreatedResponse {
        reservation_id: reservation.id.to_string(),
        status: reservation.status.to_string(),
        booking_model: reservation.booking_model.as_str().to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}
