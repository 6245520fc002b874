//! Departure availability endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use booking_store::BookingStore;
use chrono::NaiveDate;
use common::DestinationId;
use serde::Serialize;

use super::{parse_id, resolve_tenant};
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub destination_id: String,
    pub date: String,
    pub capacity: u32,
    pub status: String,
    /// Base price in minor units.
    pub base_price: i64,
}

/// GET /departures/{destination_id}/{date}: remaining capacity and status.
///
/// Destinations of other tenants are reported as not found.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: BookingStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((destination_id, date)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let destination_id: DestinationId = parse_id("destination id", &destination_id)?;
    let date: NaiveDate = parse_id("departure date", &date)?;
    let tenant = resolve_tenant(&state, &headers, None).await?;

    let owned = state
        .store
        .find_destination(destination_id)
        .await?
        .is_some_and(|destination| destination.tenant_id == tenant.id);
    if !owned {
        return Err(ApiError::NotFound(format!(
            "Destination {destination_id} not found"
        )));
    }

    let departure = state.ledger.availability(destination_id, date).await?;
    Ok(Json(AvailabilityResponse {
        destination_id: destination_id.to_string(),
        date: date.to_string(),
        capacity: departure.capacity(),
        status: departure.status().to_string(),
        base_price: departure.base_price.minor(),
    }))
}
