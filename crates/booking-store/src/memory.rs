use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{DestinationId, ReservationId, TenantId};
use domain::{Departure, Destination, Notification, Reservation, Tenant};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{BookingStore, CommitOutcome, EventOutcome, PaymentTransition, ProcessedEvent},
};

#[derive(Default)]
struct InMemoryState {
    tenants: HashMap<TenantId, Tenant>,
    destinations: HashMap<DestinationId, Destination>,
    departures: HashMap<(DestinationId, NaiveDate), Departure>,
    reservations: HashMap<ReservationId, Reservation>,
    processed_events: HashMap<String, ProcessedEvent>,
    notifications: Vec<Notification>,
    rate_counters: HashMap<(String, DateTime<Utc>), u32>,
    unavailable: bool,
}

impl InMemoryState {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Computes the decremented departure without writing it back.
    fn take_seats(
        &self,
        destination_id: DestinationId,
        date: NaiveDate,
        party_size: u32,
    ) -> Result<Departure> {
        let mut departure = self
            .departures
            .get(&(destination_id, date))
            .cloned()
            .ok_or(StoreError::UnknownDeparture {
                destination_id,
                date,
            })?;
        if !departure.try_take(party_size) {
            return Err(StoreError::InsufficientCapacity {
                requested: party_size,
                available: departure.capacity(),
            });
        }
        Ok(departure)
    }

    fn find_by_session(&self, session_id: &str) -> Option<&Reservation> {
        self.reservations
            .values()
            .find(|r| r.payment_session_id.as_deref() == Some(session_id))
    }
}

/// In-memory booking store for tests and local development.
///
/// A single lock guards all state and is held for the whole of each
/// operation, which gives the same atomicity as the Postgres transaction.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tenant.
    pub async fn upsert_tenant(&self, tenant: Tenant) {
        self.state.write().await.tenants.insert(tenant.id, tenant);
    }

    /// Inserts or replaces a destination.
    pub async fn upsert_destination(&self, destination: Destination) {
        self.state
            .write()
            .await
            .destinations
            .insert(destination.id, destination);
    }

    /// Inserts or replaces a departure.
    pub async fn upsert_departure(&self, departure: Departure) {
        self.state
            .write()
            .await
            .departures
            .insert((departure.destination_id, departure.date), departure);
    }

    /// Makes every subsequent call fail as if the database were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns all stored notifications, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    /// Returns the recorded event with the given id.
    pub async fn processed_event(&self, event_id: &str) -> Option<ProcessedEvent> {
        self.state
            .read()
            .await
            .processed_events
            .get(event_id)
            .cloned()
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    /// Number of live rate-limit counters.
    pub async fn rate_counter_count(&self) -> usize {
        self.state.read().await.rate_counters.len()
    }

    /// Returns the reservation created for a provider session, if any.
    pub async fn reservation_by_session(&self, session_id: &str) -> Option<Reservation> {
        self.state.read().await.find_by_session(session_id).cloned()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.tenants.values().find(|t| t.domain == domain).cloned())
    }

    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.tenants.get(&id).cloned())
    }

    async fn find_destination(&self, id: DestinationId) -> Result<Option<Destination>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.destinations.get(&id).cloned())
    }

    async fn get_departure(
        &self,
        destination_id: DestinationId,
        date: NaiveDate,
    ) -> Result<Option<Departure>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.departures.get(&(destination_id, date)).cloned())
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.reservations.get(&id).cloned())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.processed_events.contains_key(event_id))
    }

    async fn record_event(&self, event: ProcessedEvent) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check_available()?;
        if state.processed_events.contains_key(&event.event_id) {
            return Ok(false);
        }
        state.processed_events.insert(event.event_id.clone(), event);
        Ok(true)
    }

    async fn apply_payment(
        &self,
        event: ProcessedEvent,
        transition: PaymentTransition,
    ) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        state.check_available()?;

        if state.processed_events.contains_key(&event.event_id) {
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        // Every check runs before the first write so a rejection leaves no trace.
        let outcome = match transition {
            PaymentTransition::Materialize { reservation } => {
                let existing = reservation
                    .payment_session_id
                    .as_deref()
                    .and_then(|session_id| state.find_by_session(session_id))
                    .cloned();
                if let Some(existing) = existing {
                    CommitOutcome::AlreadyApplied {
                        reservation: existing,
                    }
                } else {
                    let departure = state.take_seats(
                        reservation.destination_id,
                        reservation.departure_date,
                        reservation.party.total(),
                    )?;
                    state
                        .departures
                        .insert((departure.destination_id, departure.date), departure.clone());
                    state
                        .reservations
                        .insert(reservation.id, reservation.clone());
                    CommitOutcome::Applied {
                        reservation,
                        departure: Some(departure),
                    }
                }
            }
            PaymentTransition::MarkPaid {
                reservation_id,
                session_id,
            } => {
                let mut reservation = state
                    .reservations
                    .get(&reservation_id)
                    .cloned()
                    .ok_or(StoreError::ReservationNotFound(reservation_id))?;
                if reservation.mark_paid(session_id, event.processed_at)? {
                    let departure = state.take_seats(
                        reservation.destination_id,
                        reservation.departure_date,
                        reservation.party.total(),
                    )?;
                    state
                        .departures
                        .insert((departure.destination_id, departure.date), departure.clone());
                    state
                        .reservations
                        .insert(reservation.id, reservation.clone());
                    CommitOutcome::Applied {
                        reservation,
                        departure: Some(departure),
                    }
                } else {
                    CommitOutcome::AlreadyApplied { reservation }
                }
            }
            PaymentTransition::MarkRemainderPaid { reservation_id } => {
                let mut reservation = state
                    .reservations
                    .get(&reservation_id)
                    .cloned()
                    .ok_or(StoreError::ReservationNotFound(reservation_id))?;
                reservation.mark_remaining_paid(event.processed_at)?;
                state
                    .reservations
                    .insert(reservation.id, reservation.clone());
                CommitOutcome::Applied {
                    reservation,
                    departure: None,
                }
            }
        };

        let event = match outcome {
            CommitOutcome::AlreadyApplied { .. } => ProcessedEvent {
                outcome: EventOutcome::Ignored,
                ..event
            },
            _ => event,
        };
        state.processed_events.insert(event.event_id.clone(), event);
        Ok(outcome)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state.notifications.push(notification.clone());
        Ok(())
    }

    async fn increment_rate_counter(&self, key: &str, window_start: DateTime<Utc>) -> Result<u32> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state
            .rate_counters
            .retain(|(_, start), _| *start >= window_start);
        let hits = state
            .rate_counters
            .entry((key.to_string(), window_start))
            .or_insert(0);
        *hits += 1;
        Ok(*hits)
    }
}

#[cfg(test)]
mod tests {
    use domain::{Money, NewBooking, PartySize, PaymentStatus, Traveler};

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
    }

    async fn store_with_departure(capacity: u32) -> (InMemoryBookingStore, DestinationId) {
        let store = InMemoryBookingStore::new();
        let destination_id = DestinationId::new();
        store
            .upsert_departure(Departure::new(
                destination_id,
                date(),
                capacity,
                Money::from_minor(50_000),
            ))
            .await;
        (store, destination_id)
    }

    fn booking(destination_id: DestinationId, adults: u32) -> NewBooking {
        NewBooking {
            tenant_id: TenantId::new(),
            destination_id,
            departure_date: date(),
            traveler: Traveler::new("Ana", "ana@example.com", None),
            party: PartySize::new(adults, 0),
            total: Money::from_minor(150_000),
            deposit: None,
        }
    }

    fn applied(event_id: &str) -> ProcessedEvent {
        ProcessedEvent::new(event_id, "checkout.session.completed", EventOutcome::Applied)
    }

    #[tokio::test]
    async fn materialize_is_atomic_on_rejection() {
        let (store, destination_id) = store_with_departure(2).await;
        let reservation =
            Reservation::materialize_paid(booking(destination_id, 3), "cs_1", Utc::now()).unwrap();

        let err = store
            .apply_payment(
                applied("evt_1"),
                PaymentTransition::Materialize { reservation },
            )
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(store.reservation_count().await, 0);
        assert!(!store.is_event_processed("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn same_event_applies_once() {
        let (store, destination_id) = store_with_departure(5).await;
        let reservation =
            Reservation::materialize_paid(booking(destination_id, 2), "cs_1", Utc::now()).unwrap();
        let transition = PaymentTransition::Materialize { reservation };

        let first = store
            .apply_payment(applied("evt_1"), transition.clone())
            .await
            .unwrap();
        assert!(matches!(first, CommitOutcome::Applied { .. }));

        let second = store
            .apply_payment(applied("evt_1"), transition)
            .await
            .unwrap();
        assert_eq!(second, CommitOutcome::AlreadyProcessed);

        let departure = store.get_departure(destination_id, date()).await.unwrap().unwrap();
        assert_eq!(departure.capacity(), 3);
        assert_eq!(store.reservation_count().await, 1);
    }

    #[tokio::test]
    async fn second_event_for_same_session_is_noop() {
        let (store, destination_id) = store_with_departure(5).await;
        let first =
            Reservation::materialize_paid(booking(destination_id, 2), "cs_1", Utc::now()).unwrap();
        let replay =
            Reservation::materialize_paid(booking(destination_id, 2), "cs_1", Utc::now()).unwrap();

        store
            .apply_payment(applied("evt_1"), PaymentTransition::Materialize { reservation: first })
            .await
            .unwrap();
        let outcome = store
            .apply_payment(applied("evt_2"), PaymentTransition::Materialize { reservation: replay })
            .await
            .unwrap();

        assert!(matches!(outcome, CommitOutcome::AlreadyApplied { .. }));
        assert_eq!(
            store.processed_event("evt_1").await.unwrap().outcome,
            EventOutcome::Applied
        );
        assert_eq!(
            store.processed_event("evt_2").await.unwrap().outcome,
            EventOutcome::Ignored
        );
        let departure = store.get_departure(destination_id, date()).await.unwrap().unwrap();
        assert_eq!(departure.capacity(), 3);
    }

    #[tokio::test]
    async fn mark_paid_then_remainder() {
        let (store, destination_id) = store_with_departure(5).await;
        let mut new_booking = booking(destination_id, 1);
        new_booking.deposit = Some(Money::from_minor(50_000));
        let reservation = Reservation::request_to_book(new_booking, Utc::now()).unwrap();
        store.insert_reservation(&reservation).await.unwrap();

        let outcome = store
            .apply_payment(
                applied("evt_dep"),
                PaymentTransition::MarkPaid {
                    reservation_id: reservation.id,
                    session_id: "cs_dep".to_string(),
                },
            )
            .await
            .unwrap();
        let CommitOutcome::Applied {
            reservation: paid,
            departure,
        } = outcome
        else {
            panic!("expected applied outcome");
        };
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(departure.unwrap().capacity(), 4);

        store
            .apply_payment(
                applied("evt_rem"),
                PaymentTransition::MarkRemainderPaid {
                    reservation_id: reservation.id,
                },
            )
            .await
            .unwrap();
        let err = store
            .apply_payment(
                applied("evt_rem_again"),
                PaymentTransition::MarkRemainderPaid {
                    reservation_id: reservation.id,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Reservation(domain::ReservationError::RemainderAlreadyPaid)
        ));

        let stored = store.get_reservation(reservation.id).await.unwrap().unwrap();
        assert!(stored.remaining_paid);
        let departure = store.get_departure(destination_id, date()).await.unwrap().unwrap();
        assert_eq!(departure.capacity(), 4);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let (store, destination_id) = store_with_departure(5).await;
        store.set_unavailable(true).await;
        assert!(matches!(
            store.get_departure(destination_id, date()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.is_event_processed("evt").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn rate_counter_counts_per_window() {
        let store = InMemoryBookingStore::new();
        let window = Utc::now();
        assert_eq!(store.increment_rate_counter("ip:1", window).await.unwrap(), 1);
        assert_eq!(store.increment_rate_counter("ip:1", window).await.unwrap(), 2);
        assert_eq!(store.increment_rate_counter("ip:2", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rate_counter_drops_earlier_windows() {
        let store = InMemoryBookingStore::new();
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let current = earlier + chrono::Duration::minutes(5);
        store.increment_rate_counter("ip:1", earlier).await.unwrap();
        store.increment_rate_counter("ip:2", earlier).await.unwrap();
        assert_eq!(store.rate_counter_count().await, 2);

        assert_eq!(store.increment_rate_counter("ip:1", current).await.unwrap(), 1);
        assert_eq!(store.rate_counter_count().await, 1);
    }
}
