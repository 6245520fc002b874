use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{DestinationId, ReservationId, TenantId};
use domain::{
    BookingModel, Departure, Destination, LOW_AVAILABILITY_THRESHOLD, Money, Notification,
    PartySize, PaymentStatus, Reservation, Tenant, Traveler,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{BookingStore, CommitOutcome, EventOutcome, PaymentTransition, ProcessedEvent},
};

const TENANT_COLUMNS: &str =
    "id, domain, stripe_account_id, charges_enabled, commission_rate, active";

const DEPARTURE_COLUMNS: &str = "destination_id, departure_date, capacity, base_price_minor";

const RESERVATION_COLUMNS: &str = r#"
    id, tenant_id, destination_id, departure_date, traveler_name, traveler_email,
    traveler_phone, adults, children, total_minor, status, booking_model, deposit_minor,
    remaining_minor, remaining_paid, payment_session_id, created_at, updated_at
"#;

/// PostgreSQL-backed booking store.
///
/// Capacity changes are single conditional `UPDATE`s and every payment is
/// applied inside one transaction together with its event claim.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Creates a new PostgreSQL booking store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Inserts or replaces a tenant.
    pub async fn upsert_tenant(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, domain, stripe_account_id, charges_enabled, commission_rate, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                domain = EXCLUDED.domain,
                stripe_account_id = EXCLUDED.stripe_account_id,
                charges_enabled = EXCLUDED.charges_enabled,
                commission_rate = EXCLUDED.commission_rate,
                active = EXCLUDED.active
            "#,
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.domain)
        .bind(&tenant.stripe_account_id)
        .bind(tenant.charges_enabled)
        .bind(tenant.commission_rate)
        .bind(tenant.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts or replaces a destination.
    pub async fn upsert_destination(&self, destination: &Destination) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO destinations (id, tenant_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET tenant_id = EXCLUDED.tenant_id, name = EXCLUDED.name
            "#,
        )
        .bind(destination.id.as_uuid())
        .bind(destination.tenant_id.as_uuid())
        .bind(&destination.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts or replaces a departure.
    pub async fn upsert_departure(&self, departure: &Departure) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO departures (destination_id, departure_date, capacity, status, base_price_minor)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (destination_id, departure_date) DO UPDATE SET
                capacity = EXCLUDED.capacity,
                status = EXCLUDED.status,
                base_price_minor = EXCLUDED.base_price_minor,
                updated_at = NOW()
            "#,
        )
        .bind(departure.destination_id.as_uuid())
        .bind(departure.date)
        .bind(to_i32(departure.capacity())?)
        .bind(departure.status().as_str())
        .bind(departure.base_price.minor())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_tenant(row: PgRow) -> Result<Tenant> {
        Ok(Tenant {
            id: TenantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            domain: row.try_get("domain")?,
            stripe_account_id: row.try_get("stripe_account_id")?,
            charges_enabled: row.try_get("charges_enabled")?,
            commission_rate: row.try_get("commission_rate")?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_departure(row: &PgRow) -> Result<Departure> {
        Ok(Departure::new(
            DestinationId::from_uuid(row.try_get::<Uuid, _>("destination_id")?),
            row.try_get("departure_date")?,
            to_u32(row.try_get("capacity")?)?,
            Money::from_minor(row.try_get("base_price_minor")?),
        ))
    }

    fn row_to_reservation(row: &PgRow) -> Result<Reservation> {
        let status: String = row.try_get("status")?;
        let booking_model: String = row.try_get("booking_model")?;

        Ok(Reservation {
            id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
            traveler: Traveler {
                name: row.try_get("traveler_name")?,
                email: row.try_get("traveler_email")?,
                phone: row.try_get("traveler_phone")?,
            },
            destination_id: DestinationId::from_uuid(row.try_get::<Uuid, _>("destination_id")?),
            departure_date: row.try_get("departure_date")?,
            party: PartySize::new(
                to_u32(row.try_get("adults")?)?,
                to_u32(row.try_get("children")?)?,
            ),
            total: Money::from_minor(row.try_get("total_minor")?),
            status: status.parse::<PaymentStatus>().map_err(StoreError::Corrupt)?,
            booking_model: booking_model
                .parse::<BookingModel>()
                .map_err(StoreError::Corrupt)?,
            deposit_amount: Money::from_minor(row.try_get("deposit_minor")?),
            remaining_amount: Money::from_minor(row.try_get("remaining_minor")?),
            remaining_paid: row.try_get("remaining_paid")?,
            payment_session_id: row.try_get("payment_session_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("count {value} out of range")))
}

/// Inserts a reservation. Returns the number of rows written, which is zero
/// when a reservation for the same payment session already exists.
async fn insert_reservation_in(conn: &mut PgConnection, r: &Reservation) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO reservations (
            id, tenant_id, destination_id, departure_date, traveler_name, traveler_email,
            traveler_phone, adults, children, total_minor, status, booking_model, deposit_minor,
            remaining_minor, remaining_paid, payment_session_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (payment_session_id) DO NOTHING
        "#,
    )
    .bind(r.id.as_uuid())
    .bind(r.tenant_id.as_uuid())
    .bind(r.destination_id.as_uuid())
    .bind(r.departure_date)
    .bind(&r.traveler.name)
    .bind(&r.traveler.email)
    .bind(&r.traveler.phone)
    .bind(to_i32(r.party.adults)?)
    .bind(to_i32(r.party.children)?)
    .bind(r.total.minor())
    .bind(r.status.as_str())
    .bind(r.booking_model.as_str())
    .bind(r.deposit_amount.minor())
    .bind(r.remaining_amount.minor())
    .bind(r.remaining_paid)
    .bind(&r.payment_session_id)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Conditionally takes seats; the status is recomputed in the same statement.
async fn decrement_in(
    conn: &mut PgConnection,
    destination_id: DestinationId,
    date: NaiveDate,
    party_size: u32,
) -> Result<Departure> {
    let requested = to_i32(party_size)?;

    let row: Option<PgRow> = sqlx::query(&format!(
        r#"
        UPDATE departures
        SET capacity = capacity - $3,
            status = CASE
                WHEN capacity - $3 = 0 THEN 'sold_out'
                WHEN capacity - $3 <= $4 THEN 'low_availability'
                ELSE 'confirmed'
            END,
            updated_at = NOW()
        WHERE destination_id = $1 AND departure_date = $2 AND capacity >= $3
        RETURNING {DEPARTURE_COLUMNS}
        "#
    ))
    .bind(destination_id.as_uuid())
    .bind(date)
    .bind(requested)
    .bind(to_i32(LOW_AVAILABILITY_THRESHOLD)?)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = row {
        return PostgresBookingStore::row_to_departure(&row);
    }

    let available: Option<i32> = sqlx::query_scalar(
        "SELECT capacity FROM departures WHERE destination_id = $1 AND departure_date = $2",
    )
    .bind(destination_id.as_uuid())
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    match available {
        None => Err(StoreError::UnknownDeparture {
            destination_id,
            date,
        }),
        Some(available) => Err(StoreError::InsufficientCapacity {
            requested: party_size,
            available: to_u32(available)?,
        }),
    }
}

/// Downgrades a claim whose payment was already reflected in the reservation.
async fn mark_claim_ignored(conn: &mut PgConnection, event_id: &str) -> Result<()> {
    sqlx::query("UPDATE processed_events SET outcome = $2 WHERE event_id = $1")
        .bind(event_id)
        .bind(EventOutcome::Ignored.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn lock_reservation(conn: &mut PgConnection, id: ReservationId) -> Result<Reservation> {
    let row: Option<PgRow> = sqlx::query(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => PostgresBookingStore::row_to_reservation(&row),
        None => Err(StoreError::ReservationNotFound(id)),
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE domain = $1"
        ))
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_tenant).transpose()
    }

    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_tenant).transpose()
    }

    async fn find_destination(&self, id: DestinationId) -> Result<Option<Destination>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, tenant_id, name FROM destinations WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(Destination {
                id: DestinationId::from_uuid(row.try_get::<Uuid, _>("id")?),
                tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_departure(
        &self,
        destination_id: DestinationId,
        date: NaiveDate,
    ) -> Result<Option<Departure>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {DEPARTURE_COLUMNS} FROM departures WHERE destination_id = $1 AND departure_date = $2"
        ))
        .bind(destination_id.as_uuid())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_departure).transpose()
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_reservation_in(&mut conn, reservation).await?;
        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_reservation).transpose()
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn record_event(&self, event: ProcessedEvent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, outcome, processed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(event.outcome.as_str())
        .bind(event.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_payment(
        &self,
        event: ProcessedEvent,
        transition: PaymentTransition,
    ) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        // Concurrent deliveries of the same id block here until the first
        // transaction resolves, then see the conflict.
        let claimed = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, outcome, processed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(event.outcome.as_str())
        .bind(event.processed_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            tx.rollback().await?;
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        // Any error below drops `tx`, rolling back the claim with everything else.
        let outcome = match transition {
            PaymentTransition::Materialize { reservation } => {
                if insert_reservation_in(&mut tx, &reservation).await? == 0 {
                    let row: PgRow = sqlx::query(&format!(
                        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE payment_session_id = $1"
                    ))
                    .bind(&reservation.payment_session_id)
                    .fetch_one(&mut *tx)
                    .await?;
                    mark_claim_ignored(&mut tx, &event.event_id).await?;
                    CommitOutcome::AlreadyApplied {
                        reservation: Self::row_to_reservation(&row)?,
                    }
                } else {
                    let departure = decrement_in(
                        &mut tx,
                        reservation.destination_id,
                        reservation.departure_date,
                        reservation.party.total(),
                    )
                    .await?;
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
                let mut reservation = lock_reservation(&mut tx, reservation_id).await?;
                if reservation.mark_paid(session_id, event.processed_at)? {
                    sqlx::query(
                        r#"
                        UPDATE reservations
                        SET status = $2, payment_session_id = $3, updated_at = $4
                        WHERE id = $1
                        "#,
                    )
                    .bind(reservation.id.as_uuid())
                    .bind(reservation.status.as_str())
                    .bind(&reservation.payment_session_id)
                    .bind(reservation.updated_at)
                    .execute(&mut *tx)
                    .await?;

                    let departure = decrement_in(
                        &mut tx,
                        reservation.destination_id,
                        reservation.departure_date,
                        reservation.party.total(),
                    )
                    .await?;
                    CommitOutcome::Applied {
                        reservation,
                        departure: Some(departure),
                    }
                } else {
                    mark_claim_ignored(&mut tx, &event.event_id).await?;
                    CommitOutcome::AlreadyApplied { reservation }
                }
            }
            PaymentTransition::MarkRemainderPaid { reservation_id } => {
                let mut reservation = lock_reservation(&mut tx, reservation_id).await?;
                reservation.mark_remaining_paid(event.processed_at)?;
                sqlx::query(
                    r#"
                    UPDATE reservations
                    SET remaining_paid = TRUE, updated_at = $2
                    WHERE id = $1 AND remaining_paid = FALSE
                    "#,
                )
                .bind(reservation.id.as_uuid())
                .bind(reservation.updated_at)
                .execute(&mut *tx)
                .await?;
                CommitOutcome::Applied {
                    reservation,
                    departure: None,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, tenant_id, kind, title, description, link, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(notification.tenant_id.as_uuid())
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.description)
        .bind(&notification.link)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_rate_counter(&self, key: &str, window_start: DateTime<Utc>) -> Result<u32> {
        sqlx::query("DELETE FROM rate_limits WHERE window_start < $1")
            .bind(window_start)
            .execute(&self.pool)
            .await?;

        let hits: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_limits (key, window_start, hits)
            VALUES ($1, $2, 1)
            ON CONFLICT (key, window_start) DO UPDATE SET hits = rate_limits.hits + 1
            RETURNING hits
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        to_u32(hits)
    }
}
