//! Integration tests for the booking lifecycle across domain types.

use chrono::{NaiveDate, Utc};
use common::{DestinationId, TenantId};
use domain::{
    BookingModel, Departure, DepartureStatus, DomainError, Money, NewBooking, PartySize,
    PaymentStatus, PricingError, Reservation, ReservationError, Tenant, Traveler,
    calculate_charge, price_amount,
};
use rust_decimal::Decimal;

fn tenant(enabled: bool) -> Tenant {
    Tenant {
        id: TenantId::new(),
        domain: "cusco-treks.example.com".to_string(),
        stripe_account_id: Some("acct_cusco".to_string()),
        charges_enabled: enabled,
        commission_rate: Decimal::new(3, 2),
        active: true,
    }
}

fn booking(tenant: &Tenant, total: f64, deposit: Option<f64>) -> Result<NewBooking, DomainError> {
    let charge = calculate_charge(total, tenant.commission_rate, None)?;
    let booking = NewBooking {
        tenant_id: tenant.id,
        destination_id: DestinationId::new(),
        departure_date: NaiveDate::from_ymd_opt(2026, 9, 20).unwrap(),
        traveler: Traveler::new("Lucía Quispe", "lucia@example.com", Some("+51 900 000 000".into())),
        party: PartySize::new(2, 1),
        total: charge.amount,
        deposit: deposit.and_then(Money::from_major),
    };
    booking.validate()?;
    Ok(booking)
}

#[test]
fn deposit_booking_lifecycle() {
    let tenant = tenant(true);
    let booking = booking(&tenant, 1000.0, Some(250.0)).unwrap();
    let mut departure = Departure::new(
        booking.destination_id,
        booking.departure_date,
        5,
        Money::from_minor(50_000),
    );

    let mut reservation = Reservation::request_to_book(booking, Utc::now()).unwrap();
    assert_eq!(reservation.status, PaymentStatus::PendingConfirmation);
    assert_eq!(reservation.booking_model, BookingModel::DepositPlusRemainder);
    assert_eq!(reservation.remaining_amount, Money::from_minor(75_000));
    assert!(matches!(
        reservation.ensure_remainder_payable(),
        Err(ReservationError::InvalidTransition { .. })
    ));

    let deposit = price_amount(
        reservation.deposit_amount,
        tenant.commission_rate,
        tenant.connected_account().as_ref(),
    )
    .unwrap();
    assert_eq!(deposit.application_fee_amount(), Money::from_minor(750));
    assert_eq!(deposit.tenant_settlement(), Money::from_minor(24_250));

    assert!(reservation.mark_paid("cs_deposit", Utc::now()).unwrap());
    assert!(departure.try_take(reservation.party.total()));
    assert_eq!(departure.capacity(), 2);
    assert_eq!(departure.status(), DepartureStatus::LowAvailability);

    reservation.mark_remaining_paid(Utc::now()).unwrap();
    assert!(reservation.remaining_paid);
    assert_eq!(
        reservation.mark_remaining_paid(Utc::now()).unwrap_err(),
        ReservationError::RemainderAlreadyPaid
    );

    reservation.transition(PaymentStatus::Reviewed, Utc::now()).unwrap();
    assert!(reservation.status.is_paid());
}

#[test]
fn paid_reservation_ignores_second_payment() {
    let tenant = tenant(true);
    let booking = booking(&tenant, 480.0, None).unwrap();
    let mut reservation = Reservation::materialize_paid(booking, "cs_first", Utc::now()).unwrap();

    assert!(!reservation.mark_paid("cs_second", Utc::now()).unwrap());
    assert_eq!(reservation.payment_session_id.as_deref(), Some("cs_first"));
    assert_eq!(reservation.booking_model, BookingModel::FullPayment);
}

#[test]
fn disabled_account_collects_without_split() {
    let tenant = tenant(false);
    assert!(tenant.has_disabled_connected_account());

    let charge = calculate_charge(1499.0, tenant.commission_rate, tenant.connected_account().as_ref())
        .unwrap();
    assert!(!charge.is_split());
    assert_eq!(charge.application_fee_amount(), Money::zero());
}

#[test]
fn invalid_input_surfaces_as_domain_errors() {
    let tenant = tenant(true);

    assert!(matches!(
        booking(&tenant, 0.0, None).unwrap_err(),
        DomainError::Pricing(PricingError::NonPositiveTotal(_))
    ));
    assert!(matches!(
        booking(&tenant, 100.0, Some(150.0)).unwrap_err(),
        DomainError::Reservation(ReservationError::InvalidDeposit { .. })
    ));
}
