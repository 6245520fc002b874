use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{DestinationId, ReservationId, TenantId};
use domain::{Departure, Destination, Notification, Reservation, Tenant};

use crate::Result;

/// How a webhook event was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOutcome {
    /// The event changed reservation/inventory state.
    Applied,
    /// The event was acknowledged without any state change.
    Ignored,
    /// The event could not be applied (e.g. sold out) and will not be retried.
    Rejected,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Applied => "applied",
            EventOutcome::Ignored => "ignored",
            EventOutcome::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable marker that an external event id has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub outcome: EventOutcome,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEvent {
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>, outcome: EventOutcome) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            outcome,
            processed_at: Utc::now(),
        }
    }
}

/// The reservation change a successful payment causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransition {
    /// Insert a paid reservation built from checkout metadata and take its seats.
    Materialize { reservation: Reservation },
    /// Move an existing reservation to paid and take its seats.
    MarkPaid {
        reservation_id: ReservationId,
        session_id: String,
    },
    /// Flag the remaining balance of a deposit booking as collected.
    MarkRemainderPaid { reservation_id: ReservationId },
}

/// Result of committing a payment unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// State changed; `departure` is the ledger row after the decrement, if any.
    Applied {
        reservation: Reservation,
        departure: Option<Departure>,
    },
    /// The reservation already reflected this payment; only the event was recorded.
    AlreadyApplied { reservation: Reservation },
    /// Another delivery of the same event id got there first. Nothing changed.
    AlreadyProcessed,
}

/// Persistence port for the booking engine.
///
/// All implementations must be thread-safe (Send + Sync) and must make
/// [`BookingStore::apply_payment`] atomic with respect to concurrent callers.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Looks up an active or inactive tenant by normalized storefront host.
    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>>;

    /// Looks up a tenant by id.
    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>>;

    async fn find_destination(&self, id: DestinationId) -> Result<Option<Destination>>;

    async fn get_departure(
        &self,
        destination_id: DestinationId,
        date: NaiveDate,
    ) -> Result<Option<Departure>>;

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()>;

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Returns true if the event id has already been recorded.
    async fn is_event_processed(&self, event_id: &str) -> Result<bool>;

    /// Records an event that changes no state.
    ///
    /// Returns false if the id was already recorded.
    async fn record_event(&self, event: ProcessedEvent) -> Result<bool>;

    /// Claims `event` and applies `transition` as one unit of work.
    ///
    /// Either the claim, the reservation write and the capacity decrement all
    /// commit, or none of them do. A business rejection leaves no trace,
    /// not even the claim. Seats are taken with a single conditional write,
    /// so capacity never goes below zero. When the reservation already
    /// reflected the payment the claim is stored as `Ignored`.
    async fn apply_payment(
        &self,
        event: ProcessedEvent,
        transition: PaymentTransition,
    ) -> Result<CommitOutcome>;

    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Increments the hit counter for `key` in the window starting at
    /// `window_start` and returns the new count. Counters of earlier windows
    /// are dropped.
    async fn increment_rate_counter(&self, key: &str, window_start: DateTime<Utc>) -> Result<u32>;
}
