//! Domain layer for the booking engine.
//!
//! This crate holds the plain data and pure rules the rest of the system
//! builds on:
//! - Tenant and destination records consumed read-only by the engine
//! - Departure capacity and its derived availability status
//! - Reservation state machine (payment status, deposit/remainder tracking)
//! - Commission and application-fee pricing
//! - Agency notifications emitted after payment transitions

pub mod booking;
pub mod departure;
pub mod error;
pub mod money;
pub mod notification;
pub mod pricing;
pub mod tenant;

pub use booking::{
    BookingModel, NewBooking, PartySize, PaymentStatus, Reservation, ReservationError, Traveler,
};
pub use departure::{Departure, DepartureStatus, LOW_AVAILABILITY_THRESHOLD};
pub use error::DomainError;
pub use money::Money;
pub use notification::{Notification, NotificationKind};
pub use pricing::{ChargeBreakdown, ConnectedAccount, PricingError, calculate_charge, price_amount};
pub use tenant::{Destination, Tenant};
