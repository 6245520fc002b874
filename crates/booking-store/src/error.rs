use chrono::NaiveDate;
use common::{DestinationId, ReservationId};
use domain::ReservationError;
use thiserror::Error;

/// Errors that can occur when interacting with the booking store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No departure is scheduled on that date for the destination.
    #[error("Unknown departure {date} for destination {destination_id}")]
    UnknownDeparture {
        destination_id: DestinationId,
        date: NaiveDate,
    },

    /// The departure does not have enough seats left.
    #[error("Insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u32, available: u32 },

    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// The reservation state machine refused the change.
    #[error("Reservation rule violated: {0}")]
    Reservation(#[from] ReservationError),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for errors caused by the request itself rather than by
    /// the infrastructure. Retrying such a request cannot succeed.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownDeparture { .. }
                | StoreError::InsufficientCapacity { .. }
                | StoreError::ReservationNotFound(_)
                | StoreError::Reservation(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
