//! Domain error types.

use thiserror::Error;

use crate::booking::ReservationError;
use crate::pricing::PricingError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    /// An error occurred on a reservation.
    #[error("Reservation error: {0}")]
    Reservation(#[from] ReservationError),

    /// A charge could not be priced.
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),
}
