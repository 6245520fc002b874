//! The reservation record and its transitions.

use chrono::{DateTime, NaiveDate, Utc};
use common::{DestinationId, ReservationId, TenantId};
use serde::{Deserialize, Serialize};

use super::{BookingModel, PartySize, PaymentStatus, ReservationError, Traveler};
use crate::money::Money;

/// Validated booking details, before a reservation row exists.
///
/// This is what travels through checkout metadata for immediate payments and
/// what request-to-book persists eagerly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub tenant_id: TenantId,
    pub destination_id: DestinationId,
    pub departure_date: NaiveDate,
    pub traveler: Traveler,
    pub party: PartySize,
    pub total: Money,
    /// Amount collected up front; `None` means the full total.
    pub deposit: Option<Money>,
}

impl NewBooking {
    /// Checks traveler, party size, total and deposit.
    pub fn validate(&self) -> Result<(), ReservationError> {
        self.traveler.validate()?;
        self.party.validate()?;
        if !self.total.is_positive() {
            return Err(ReservationError::NonPositiveTotal(self.total));
        }
        if let Some(deposit) = self.deposit
            && (!deposit.is_positive() || deposit > self.total)
        {
            return Err(ReservationError::InvalidDeposit {
                deposit,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Splits the total into `(model, deposit, remaining)`.
    ///
    /// A deposit equal to the total is a full payment.
    pub fn payment_plan(&self) -> (BookingModel, Money, Money) {
        match self.deposit {
            Some(deposit) if deposit < self.total => (
                BookingModel::DepositPlusRemainder,
                deposit,
                self.total - deposit,
            ),
            _ => (BookingModel::FullPayment, self.total, Money::zero()),
        }
    }
}

/// A traveler's booking against one destination departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub tenant_id: TenantId,
    pub traveler: Traveler,
    pub destination_id: DestinationId,
    pub departure_date: NaiveDate,
    pub party: PartySize,
    pub total: Money,
    pub status: PaymentStatus,
    pub booking_model: BookingModel,
    pub deposit_amount: Money,
    pub remaining_amount: Money,
    pub remaining_paid: bool,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    fn from_booking(booking: NewBooking, status: PaymentStatus, now: DateTime<Utc>) -> Self {
        let (booking_model, deposit_amount, remaining_amount) = booking.payment_plan();
        Self {
            id: ReservationId::new(),
            tenant_id: booking.tenant_id,
            traveler: booking.traveler,
            destination_id: booking.destination_id,
            departure_date: booking.departure_date,
            party: booking.party,
            total: booking.total,
            status,
            booking_model,
            deposit_amount,
            remaining_amount,
            remaining_paid: false,
            payment_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a reservation awaiting confirmation, before any payment.
    pub fn request_to_book(booking: NewBooking, now: DateTime<Utc>) -> Result<Self, ReservationError> {
        booking.validate()?;
        Ok(Self::from_booking(
            booking,
            PaymentStatus::PendingConfirmation,
            now,
        ))
    }

    /// Materializes a paid reservation from an immediate-payment checkout.
    ///
    /// Immediate payments always collect the full total.
    pub fn materialize_paid(
        booking: NewBooking,
        session_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ReservationError> {
        let booking = NewBooking {
            deposit: None,
            ..booking
        };
        booking.validate()?;
        let mut reservation = Self::from_booking(booking, PaymentStatus::Paid, now);
        reservation.payment_session_id = Some(session_id.into());
        Ok(reservation)
    }

    /// Records a successful payment.
    ///
    /// Returns `Ok(false)` without changes when the reservation is already
    /// paid, so that out-of-order redelivery for the same booking is a no-op.
    pub fn mark_paid(
        &mut self,
        session_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, ReservationError> {
        if self.status.is_paid() {
            return Ok(false);
        }
        if !self.status.can_mark_paid() {
            return Err(ReservationError::InvalidTransition {
                from: self.status,
                to: PaymentStatus::Paid,
            });
        }
        self.status = PaymentStatus::Paid;
        self.payment_session_id = Some(session_id.into());
        self.updated_at = now;
        Ok(true)
    }

    /// Checks whether the remaining balance can still be collected.
    pub fn ensure_remainder_payable(&self) -> Result<(), ReservationError> {
        if !self.booking_model.is_deposit() {
            return Err(ReservationError::NotDepositBooking);
        }
        if self.remaining_paid {
            return Err(ReservationError::RemainderAlreadyPaid);
        }
        // The deposit must have been collected, and its seats taken, first.
        if !self.status.is_paid() {
            return Err(ReservationError::InvalidTransition {
                from: self.status,
                to: PaymentStatus::Paid,
            });
        }
        Ok(())
    }

    /// Flags the remaining balance as paid. The flag never goes back to false.
    pub fn mark_remaining_paid(&mut self, now: DateTime<Utc>) -> Result<(), ReservationError> {
        self.ensure_remainder_payable()?;
        self.remaining_paid = true;
        self.updated_at = now;
        Ok(())
    }

    /// Moves to another payment status if the state machine allows it.
    pub fn transition(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<(), ReservationError> {
        if !self.status.can_transition_to(next) {
            return Err(ReservationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(total: i64, deposit: Option<i64>) -> NewBooking {
        NewBooking {
            tenant_id: TenantId::new(),
            destination_id: DestinationId::new(),
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            traveler: Traveler::new("Ana Ruiz", "ana@example.com", None),
            party: PartySize::new(2, 1),
            total: Money::from_minor(total),
            deposit: deposit.map(Money::from_minor),
        }
    }

    #[test]
    fn request_to_book_full_payment_plan() {
        let r = Reservation::request_to_book(booking(150_000, None), Utc::now()).unwrap();
        assert_eq!(r.status, PaymentStatus::PendingConfirmation);
        assert_eq!(r.booking_model, BookingModel::FullPayment);
        assert_eq!(r.deposit_amount.minor(), 150_000);
        assert_eq!(r.remaining_amount, Money::zero());
        assert!(!r.remaining_paid);
    }

    #[test]
    fn request_to_book_deposit_plan_sums_to_total() {
        let r = Reservation::request_to_book(booking(150_000, Some(30_000)), Utc::now()).unwrap();
        assert_eq!(r.booking_model, BookingModel::DepositPlusRemainder);
        assert_eq!(r.deposit_amount + r.remaining_amount, r.total);
        assert_eq!(r.remaining_amount.minor(), 120_000);
    }

    #[test]
    fn deposit_equal_to_total_is_full_payment() {
        let r = Reservation::request_to_book(booking(1000, Some(1000)), Utc::now()).unwrap();
        assert_eq!(r.booking_model, BookingModel::FullPayment);
    }

    #[test]
    fn rejects_invalid_deposit() {
        assert!(matches!(
            Reservation::request_to_book(booking(1000, Some(2000)), Utc::now()),
            Err(ReservationError::InvalidDeposit { .. })
        ));
        assert!(matches!(
            Reservation::request_to_book(booking(1000, Some(0)), Utc::now()),
            Err(ReservationError::InvalidDeposit { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_total() {
        assert!(matches!(
            Reservation::request_to_book(booking(0, None), Utc::now()),
            Err(ReservationError::NonPositiveTotal(_))
        ));
    }

    #[test]
    fn materialize_ignores_deposit() {
        let r = Reservation::materialize_paid(booking(5000, Some(1000)), "cs_1", Utc::now()).unwrap();
        assert_eq!(r.status, PaymentStatus::Paid);
        assert_eq!(r.booking_model, BookingModel::FullPayment);
        assert_eq!(r.payment_session_id.as_deref(), Some("cs_1"));
    }

    #[test]
    fn mark_paid_is_idempotent() {
        let mut r = Reservation::request_to_book(booking(5000, None), Utc::now()).unwrap();
        assert_eq!(r.mark_paid("cs_1", Utc::now()), Ok(true));
        assert_eq!(r.mark_paid("cs_2", Utc::now()), Ok(false));
        assert_eq!(r.payment_session_id.as_deref(), Some("cs_1"));
    }

    #[test]
    fn cancelled_cannot_be_paid() {
        let mut r = Reservation::request_to_book(booking(5000, None), Utc::now()).unwrap();
        r.status = PaymentStatus::Cancelled;
        assert!(matches!(
            r.mark_paid("cs_1", Utc::now()),
            Err(ReservationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn remaining_paid_only_once() {
        let mut r = Reservation::request_to_book(booking(5000, Some(1000)), Utc::now()).unwrap();
        r.mark_paid("cs_1", Utc::now()).unwrap();

        r.mark_remaining_paid(Utc::now()).unwrap();
        assert!(r.remaining_paid);
        assert_eq!(
            r.mark_remaining_paid(Utc::now()),
            Err(ReservationError::RemainderAlreadyPaid)
        );
        assert!(r.remaining_paid);
    }

    #[test]
    fn remainder_requires_deposit_model() {
        let mut r = Reservation::request_to_book(booking(5000, None), Utc::now()).unwrap();
        assert_eq!(
            r.mark_remaining_paid(Utc::now()),
            Err(ReservationError::NotDepositBooking)
        );
    }

    #[test]
    fn remainder_requires_collected_deposit() {
        let mut r = Reservation::request_to_book(booking(5000, Some(1000)), Utc::now()).unwrap();
        let not_paid = || {
            Err(ReservationError::InvalidTransition {
                from: PaymentStatus::PendingConfirmation,
                to: PaymentStatus::Paid,
            })
        };
        assert_eq!(r.ensure_remainder_payable(), not_paid());
        assert_eq!(r.mark_remaining_paid(Utc::now()), not_paid());
        assert!(!r.remaining_paid);

        r.status = PaymentStatus::Cancelled;
        assert!(matches!(
            r.mark_remaining_paid(Utc::now()),
            Err(ReservationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn remainder_allowed_after_review() {
        let mut r = Reservation::request_to_book(booking(5000, Some(1000)), Utc::now()).unwrap();
        r.mark_paid("cs_1", Utc::now()).unwrap();
        r.transition(PaymentStatus::Reviewed, Utc::now()).unwrap();
        assert!(r.ensure_remainder_payable().is_ok());
    }

    #[test]
    fn transition_follows_state_machine() {
        let mut r = Reservation::request_to_book(booking(5000, None), Utc::now()).unwrap();
        assert!(r.transition(PaymentStatus::Reviewed, Utc::now()).is_err());
        r.transition(PaymentStatus::Paid, Utc::now()).unwrap();
        r.transition(PaymentStatus::Reviewed, Utc::now()).unwrap();
        r.transition(PaymentStatus::Cancelled, Utc::now()).unwrap();
        assert!(r.transition(PaymentStatus::Paid, Utc::now()).is_err());
    }
}
