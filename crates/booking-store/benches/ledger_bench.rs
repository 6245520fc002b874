use std::sync::Arc;

use booking_store::{
    EventOutcome, InMemoryBookingStore, InventoryLedger, PaymentTransition, ProcessedEvent,
};
use chrono::{NaiveDate, Utc};
use common::{DestinationId, TenantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Departure, Money, NewBooking, PartySize, Reservation, Traveler};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 14).unwrap()
}

async fn seeded(capacity: u32) -> (Arc<InMemoryBookingStore>, DestinationId) {
    let store = Arc::new(InMemoryBookingStore::new());
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

fn paid_booking(destination_id: DestinationId, n: usize) -> (ProcessedEvent, PaymentTransition) {
    let booking = NewBooking {
        tenant_id: TenantId::new(),
        destination_id,
        departure_date: date(),
        traveler: Traveler::new("Bench Traveler", "bench@example.com", None),
        party: PartySize::new(2, 0),
        total: Money::from_minor(100_000),
        deposit: None,
    };
    let reservation = Reservation::materialize_paid(booking, format!("cs_bench_{n}"), Utc::now())
        .unwrap();
    (
        ProcessedEvent::new(
            format!("evt_bench_{n}"),
            "checkout.session.completed",
            EventOutcome::Applied,
        ),
        PaymentTransition::Materialize { reservation },
    )
}

fn bench_sell_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/payments_until_sold_out", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (store, destination_id) = seeded(100).await;
                let ledger = InventoryLedger::new(store);
                for n in 0..50 {
                    let (event, transition) = paid_booking(destination_id, n);
                    ledger.commit_payment(event, transition).await.unwrap();
                }
                let (event, transition) = paid_booking(destination_id, 50);
                assert!(ledger.commit_payment(event, transition).await.is_err());
            });
        });
    });
}

fn bench_redelivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/apply_payment_with_redelivery", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (store, destination_id) = seeded(10).await;
                let ledger = InventoryLedger::new(store);
                let (event, transition) = paid_booking(destination_id, 0);
                for _ in 0..2 {
                    ledger
                        .commit_payment(event.clone(), transition.clone())
                        .await
                        .unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_sell_out, bench_redelivery);
criterion_main!(benches);
