//! Reservation record and related types.

mod reservation;
mod state;
mod value_objects;

pub use reservation::{NewBooking, Reservation};
pub use state::PaymentStatus;
pub use value_objects::{BookingModel, PartySize, Traveler};

use thiserror::Error;

use crate::money::Money;

/// Errors that can occur during reservation operations.
#[derive(Debug, Error, PartialEq)]
pub enum ReservationError {
    /// Status change not allowed by the state machine.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// The remaining balance was already collected.
    #[error("Remaining balance already paid")]
    RemainderAlreadyPaid,

    /// The reservation was not booked with a deposit.
    #[error("Reservation is not a deposit booking")]
    NotDepositBooking,

    /// A traveler field is missing.
    #[error("Traveler {0} is required")]
    MissingTravelerField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// No travelers on the booking.
    #[error("Party size must be at least 1")]
    EmptyParty,

    #[error("Total must be greater than zero, got {0}")]
    NonPositiveTotal(Money),

    /// Deposit must be positive and not exceed the total.
    #[error("Invalid deposit {deposit} for total {total}")]
    InvalidDeposit { deposit: Money, total: Money },
}
