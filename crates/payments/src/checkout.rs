//! Checkout session builder and request-to-book.

use std::sync::Arc;

use booking_store::{BookingStore, StoreError};
use chrono::{NaiveDate, Utc};
use common::{DestinationId, ReservationId};
use domain::{
    ChargeBreakdown, Destination, Money, NewBooking, PartySize, PaymentStatus, Reservation,
    ReservationError, Tenant, Traveler, calculate_charge, price_amount,
};

use crate::error::CheckoutError;
use crate::metadata::{CheckoutPurpose, SessionMetadata};
use crate::provider::{CheckoutSessionParams, PaymentProvider};

/// A booking as submitted by a traveler. Amounts are in major units.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub destination_id: DestinationId,
    pub departure_date: NaiveDate,
    pub traveler: Traveler,
    pub party: PartySize,
    pub total: f64,
    /// Only honored by request-to-book.
    pub deposit_amount: Option<f64>,
}

/// Where to send the traveler to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub redirect_url: String,
}

/// Deployment-wide checkout settings.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    /// Overrides the tenant storefront as the base of return URLs.
    pub public_base_url: Option<String>,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "eur".to_string(),
            public_base_url: None,
        }
    }
}

/// Builds provider checkout sessions and request-to-book reservations.
///
/// Every amount and every piece of metadata is validated before the
/// provider is called.
pub struct CheckoutService<S: BookingStore> {
    store: Arc<S>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl<S: BookingStore> CheckoutService<S> {
    pub fn new(
        store: Arc<S>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// Opens a checkout for the full amount; the reservation is only created
    /// once the payment webhook arrives.
    #[tracing::instrument(skip(self, tenant, request), fields(tenant_id = %tenant.id, destination_id = %request.destination_id))]
    pub async fn create_checkout(
        &self,
        tenant: &Tenant,
        request: BookingRequest,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        ensure_can_charge(tenant)?;
        if request.deposit_amount.is_some() {
            return Err(CheckoutError::Validation(
                "deposits are only available for request-to-book".to_string(),
            ));
        }

        let charge = calculate_charge(
            request.total,
            tenant.commission_rate,
            tenant.connected_account().as_ref(),
        )?;
        let booking = NewBooking {
            tenant_id: tenant.id,
            destination_id: request.destination_id,
            departure_date: request.departure_date,
            traveler: request.traveler,
            party: request.party,
            total: charge.amount,
            deposit: None,
        };
        booking.validate()?;

        let destination = self.owned_destination(tenant, booking.destination_id).await?;
        self.ensure_capacity(
            booking.destination_id,
            booking.departure_date,
            booking.party.total(),
        )
        .await?;

        let email = booking.traveler.email.clone();
        self.open_session(
            tenant,
            charge,
            destination.name,
            Some(email),
            CheckoutPurpose::Booking(booking),
        )
        .await
    }

    /// Records a reservation awaiting confirmation without touching inventory.
    #[tracing::instrument(skip(self, tenant, request), fields(tenant_id = %tenant.id, destination_id = %request.destination_id))]
    pub async fn request_to_book(
        &self,
        tenant: &Tenant,
        request: BookingRequest,
    ) -> Result<Reservation, CheckoutError> {
        let total = calculate_charge(request.total, tenant.commission_rate, None)?.amount;
        let deposit = request
            .deposit_amount
            .map(|amount| {
                Money::from_major(amount).ok_or_else(|| {
                    CheckoutError::Validation(format!("invalid deposit amount: {amount}"))
                })
            })
            .transpose()?;

        let booking = NewBooking {
            tenant_id: tenant.id,
            destination_id: request.destination_id,
            departure_date: request.departure_date,
            traveler: request.traveler,
            party: request.party,
            total,
            deposit,
        };
        booking.validate()?;

        self.owned_destination(tenant, booking.destination_id).await?;
        self.ensure_capacity(
            booking.destination_id,
            booking.departure_date,
            booking.party.total(),
        )
        .await?;

        let reservation = Reservation::request_to_book(booking, Utc::now())?;
        self.store.insert_reservation(&reservation).await?;

        tracing::info!(
            reservation_id = %reservation.id,
            booking_model = reservation.booking_model.as_str(),
            "reservation requested"
        );
        Ok(reservation)
    }

    /// Opens a checkout for an existing unpaid reservation: the deposit for
    /// deposit bookings, the total otherwise.
    #[tracing::instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    pub async fn create_reservation_checkout(
        &self,
        tenant: &Tenant,
        reservation_id: ReservationId,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        ensure_can_charge(tenant)?;
        let reservation = self.owned_reservation(tenant, reservation_id).await?;
        if !reservation.status.can_mark_paid() {
            return Err(ReservationError::InvalidTransition {
                from: reservation.status,
                to: PaymentStatus::Paid,
            }
            .into());
        }

        let amount = if reservation.booking_model.is_deposit() {
            reservation.deposit_amount
        } else {
            reservation.total
        };
        let charge = price_amount(
            amount,
            tenant.commission_rate,
            tenant.connected_account().as_ref(),
        )?;
        self.ensure_capacity(
            reservation.destination_id,
            reservation.departure_date,
            reservation.party.total(),
        )
        .await?;

        let product_name = self.product_name(&reservation).await?;
        self.open_session(
            tenant,
            charge,
            product_name,
            Some(reservation.traveler.email.clone()),
            CheckoutPurpose::Reservation {
                tenant_id: tenant.id,
                reservation_id: reservation.id,
            },
        )
        .await
    }

    /// Opens a checkout for the remaining balance of a deposit booking.
    #[tracing::instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    pub async fn create_remaining_checkout(
        &self,
        tenant: &Tenant,
        reservation_id: ReservationId,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        ensure_can_charge(tenant)?;
        let reservation = self.owned_reservation(tenant, reservation_id).await?;
        reservation.ensure_remainder_payable()?;

        let charge = price_amount(
            reservation.remaining_amount,
            tenant.commission_rate,
            tenant.connected_account().as_ref(),
        )?;
        let product_name = self.product_name(&reservation).await?;
        self.open_session(
            tenant,
            charge,
            format!("{product_name} (remaining balance)"),
            Some(reservation.traveler.email.clone()),
            CheckoutPurpose::Remainder {
                tenant_id: tenant.id,
                reservation_id: reservation.id,
            },
        )
        .await
    }

    async fn open_session(
        &self,
        tenant: &Tenant,
        charge: ChargeBreakdown,
        product_name: String,
        customer_email: Option<String>,
        purpose: CheckoutPurpose,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        let metadata = SessionMetadata::for_purpose(&purpose);
        metadata.validate()?;

        let base = self
            .settings
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", tenant.domain));
        let params = CheckoutSessionParams {
            amount: charge.amount,
            currency: self.settings.currency.clone(),
            product_name,
            customer_email,
            success_url: format!("{base}/booking/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/booking/cancelled"),
            application_fee: charge.application_fee,
            destination_account: charge.destination_account.clone(),
            metadata,
        };

        let session = self
            .provider
            .create_checkout_session(params)
            .await
            .inspect_err(|error| tracing::warn!(%error, "checkout session creation failed"))?;

        metrics::counter!("checkout_sessions_total", "kind" => purpose.as_str()).increment(1);
        tracing::info!(
            session_id = %session.id,
            amount = charge.amount.minor(),
            application_fee = charge.application_fee_amount().minor(),
            kind = purpose.as_str(),
            "checkout session created"
        );

        Ok(CheckoutRedirect {
            session_id: session.id,
            redirect_url: session.url,
        })
    }

    async fn owned_destination(
        &self,
        tenant: &Tenant,
        destination_id: DestinationId,
    ) -> Result<Destination, CheckoutError> {
        self.store
            .find_destination(destination_id)
            .await?
            .filter(|destination| destination.tenant_id == tenant.id)
            .ok_or(CheckoutError::DestinationNotFound(destination_id))
    }

    async fn owned_reservation(
        &self,
        tenant: &Tenant,
        reservation_id: ReservationId,
    ) -> Result<Reservation, CheckoutError> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .filter(|reservation| reservation.tenant_id == tenant.id)
            .ok_or(CheckoutError::ReservationNotFound(reservation_id))
    }

    async fn ensure_capacity(
        &self,
        destination_id: DestinationId,
        date: NaiveDate,
        party_size: u32,
    ) -> Result<(), CheckoutError> {
        let departure = self
            .store
            .get_departure(destination_id, date)
            .await?
            .ok_or(StoreError::UnknownDeparture {
                destination_id,
                date,
            })?;
        if !departure.can_accommodate(party_size) {
            return Err(StoreError::InsufficientCapacity {
                requested: party_size,
                available: departure.capacity(),
            }
            .into());
        }
        Ok(())
    }

    async fn product_name(&self, reservation: &Reservation) -> Result<String, CheckoutError> {
        Ok(self
            .store
            .find_destination(reservation.destination_id)
            .await?
            .map(|destination| destination.name)
            .unwrap_or_else(|| "Trip reservation".to_string()))
    }
}

fn ensure_can_charge(tenant: &Tenant) -> Result<(), CheckoutError> {
    if tenant.has_disabled_connected_account() {
        return Err(CheckoutError::ChargesDisabled(tenant.id));
    }
    Ok(())
}
