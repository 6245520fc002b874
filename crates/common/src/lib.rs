//! Shared identifier types used across the booking engine crates.

pub mod types;

pub use types::{DestinationId, ReservationId, TenantId};
