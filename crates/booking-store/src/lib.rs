//! Persistence for the booking engine.
//!
//! [`BookingStore`] is the single port through which reservations, departure
//! capacity and processed webhook events are read and written. Two
//! implementations share the same guarantees:
//! - [`InMemoryBookingStore`] for tests and local development
//! - [`PostgresBookingStore`] backed by sqlx
//!
//! The [`InventoryLedger`] wraps a store and drives the payment unit of work,
//! the only place departure capacity changes.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use ledger::InventoryLedger;
pub use memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;
pub use store::{BookingStore, CommitOutcome, EventOutcome, PaymentTransition, ProcessedEvent};
