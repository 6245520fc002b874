//! Inventory ledger: the gatekeeper for departure capacity.

use std::sync::Arc;

use chrono::NaiveDate;
use common::DestinationId;
use domain::Departure;

use crate::{
    Result, StoreError,
    store::{BookingStore, CommitOutcome, PaymentTransition, ProcessedEvent},
};

/// Capacity reads and payment-driven decrements over a [`BookingStore`].
///
/// Seats are only ever taken inside [`BookingStore::apply_payment`], in the
/// same unit of work as the reservation write and the event claim. The ledger
/// drives that unit of work and counts every decrement it attempts.
pub struct InventoryLedger<S: BookingStore> {
    store: Arc<S>,
}

impl<S: BookingStore> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BookingStore> InventoryLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Applies a payment and, unless it is a remainder, takes its seats.
    ///
    /// Exactly one of several concurrent payments competing for the last
    /// seats succeeds; the others fail with `InsufficientCapacity` and leave
    /// nothing behind.
    #[tracing::instrument(skip(self, event, transition), fields(event_id = %event.event_id))]
    pub async fn commit_payment(
        &self,
        event: ProcessedEvent,
        transition: PaymentTransition,
    ) -> Result<CommitOutcome> {
        let takes_seats = !matches!(transition, PaymentTransition::MarkRemainderPaid { .. });
        let result = self.store.apply_payment(event, transition).await;
        if takes_seats {
            record_decrement(&result);
        }

        if let Ok(CommitOutcome::Applied {
            departure: Some(departure),
            ..
        }) = &result
        {
            tracing::info!(
                capacity = departure.capacity(),
                status = %departure.status(),
                "departure capacity decremented"
            );
        }
        result
    }

    /// Current capacity and status of a departure.
    pub async fn availability(
        &self,
        destination_id: DestinationId,
        date: NaiveDate,
    ) -> Result<Departure> {
        self.store
            .get_departure(destination_id, date)
            .await?
            .ok_or(StoreError::UnknownDeparture {
                destination_id,
                date,
            })
    }
}

/// Counts a decrement attempt under `inventory_decrements_total{result}`.
///
/// Commits that never reached the decrement (duplicates, unknown
/// reservations, refused transitions) are not counted.
fn record_decrement(result: &Result<CommitOutcome>) {
    let label = match result {
        Ok(CommitOutcome::Applied {
            departure: Some(_), ..
        }) => "ok",
        Err(StoreError::InsufficientCapacity { .. }) => "insufficient_capacity",
        Err(StoreError::UnknownDeparture { .. }) => "unknown_departure",
        Err(error) if !error.is_rejection() => "error",
        _ => return,
    };
    metrics::counter!("inventory_decrements_total", "result" => label).increment(1);
}
