//! Webhook event processor.
//!
//! Reconciles provider events with reservation and inventory state. A
//! delivery goes through:
//!
//! ```text
//! verify signature ─► parse ─► dedup ─► classify ─► apply (one unit of work) ─► notify
//! ```
//!
//! Only infrastructure failures are returned as errors; everything the
//! provider cannot fix by redelivering is acknowledged and recorded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use booking_store::{
    BookingStore, CommitOutcome, EventOutcome, InventoryLedger, PaymentTransition,
    ProcessedEvent, StoreError,
};
use chrono::Utc;
use common::{ReservationId, TenantId};
use domain::{Notification, NotificationKind, Reservation};
use serde::Deserialize;

use crate::error::{SignatureError, WebhookError};
use crate::metadata::{CheckoutPurpose, SessionMetadata};
use crate::notify::NotificationDispatcher;
use crate::signature::WebhookVerifier;

const SESSION_COMPLETED: &str = "checkout.session.completed";
const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
const SESSION_EXPIRED: &str = "checkout.session.expired";
const ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";

/// What happened to a delivery. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payment was applied.
    Applied { reservation_id: ReservationId },
    /// The event, or the payment it reports, was already applied.
    Duplicate,
    /// Recorded without any state change.
    Ignored,
    /// The payment could not be applied and never will be.
    Rejected { reason: String },
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied { .. } => "applied",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

enum Classification {
    Success(CheckoutSessionObject),
    Failure(CheckoutSessionObject),
    Ignored,
}

fn classify(event: &ProviderEvent) -> Result<Classification, WebhookError> {
    let session = || CheckoutSessionObject::deserialize(&event.data.object);
    Ok(match event.event_type.as_str() {
        SESSION_COMPLETED => {
            let session = session()?;
            match session.payment_status.as_deref() {
                Some("paid" | "no_payment_required") => Classification::Success(session),
                // Delayed methods complete unpaid and report later.
                _ => Classification::Ignored,
            }
        }
        ASYNC_PAYMENT_SUCCEEDED => Classification::Success(session()?),
        SESSION_EXPIRED | ASYNC_PAYMENT_FAILED => Classification::Failure(session()?),
        _ => Classification::Ignored,
    })
}

/// Processes provider webhook deliveries.
pub struct WebhookProcessor<S: BookingStore> {
    store: Arc<S>,
    ledger: InventoryLedger<S>,
    verifier: WebhookVerifier,
    notifications: NotificationDispatcher,
}

impl<S: BookingStore> WebhookProcessor<S> {
    pub fn new(
        store: Arc<S>,
        verifier: WebhookVerifier,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            ledger: InventoryLedger::new(Arc::clone(&store)),
            store,
            verifier,
            notifications,
        }
    }

    /// Authenticates and processes one delivery.
    ///
    /// `Ok` means the delivery can be acknowledged. `Err` is either an
    /// integrity failure (never retried successfully) or a retryable store
    /// failure, see [`WebhookError::is_retryable`].
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let started = Instant::now();

        let verified = signature_header
            .ok_or(SignatureError::MissingHeader)
            .and_then(|header| self.verifier.verify(payload, header, Utc::now().timestamp()));
        if let Err(error) = verified {
            tracing::warn!(%error, "webhook signature rejected");
            metrics::counter!("webhook_events_total", "outcome" => "invalid_signature")
                .increment(1);
            return Err(error.into());
        }
        let event: ProviderEvent = serde_json::from_slice(payload).inspect_err(|error| {
            tracing::warn!(%error, "malformed webhook payload");
        })?;

        let result = self.process(&event).await;

        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        };
        metrics::counter!("webhook_events_total", "outcome" => outcome).increment(1);
        metrics::histogram!("webhook_processing_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn process(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        if self.store.is_event_processed(&event.id).await? {
            tracing::info!("duplicate delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        match classify(event)? {
            Classification::Success(session) => self.apply_success(event, session).await,
            Classification::Failure(session) => self.record_failure(event, session).await,
            Classification::Ignored => {
                self.record(event, EventOutcome::Ignored).await?;
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn apply_success(
        &self,
        event: &ProviderEvent,
        session: CheckoutSessionObject,
    ) -> Result<WebhookOutcome, WebhookError> {
        let metadata = SessionMetadata::from(session.metadata);
        let purpose = match metadata.purpose() {
            Ok(Some(purpose)) => purpose,
            Ok(None) => {
                tracing::info!(session_id = %session.id, "session not created by this engine");
                self.record(event, EventOutcome::Ignored).await?;
                return Ok(WebhookOutcome::Ignored);
            }
            Err(error) => {
                // Without a readable tenant there is nobody to notify.
                return self.reject(event, None, error.to_string()).await;
            }
        };
        let tenant_id = purpose.tenant_id();

        let transition = match self.transition_for(&purpose, &session.id).await? {
            Ok(transition) => transition,
            Err(reason) => return self.reject(event, Some(tenant_id), reason).await,
        };

        let claim = ProcessedEvent::new(&event.id, &event.event_type, EventOutcome::Applied);
        match self.ledger.commit_payment(claim, transition).await {
            Ok(CommitOutcome::Applied { reservation, .. }) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    tenant_id = %reservation.tenant_id,
                    "payment applied"
                );
                self.notifications
                    .dispatch(paid_notification(&purpose, &reservation))
                    .await;
                Ok(WebhookOutcome::Applied {
                    reservation_id: reservation.id,
                })
            }
            Ok(CommitOutcome::AlreadyApplied { reservation }) => {
                tracing::info!(reservation_id = %reservation.id, "payment already applied for session");
                Ok(WebhookOutcome::Duplicate)
            }
            Ok(CommitOutcome::AlreadyProcessed) => Ok(WebhookOutcome::Duplicate),
            Err(error) if error.is_rejection() => {
                self.reject(event, Some(tenant_id), error.to_string()).await
            }
            Err(error) => {
                tracing::error!(%error, "payment unit of work failed");
                Err(error.into())
            }
        }
    }

    /// Builds the transition for a successful payment.
    ///
    /// The inner `Err` carries the reason a payment can never be applied;
    /// the outer one is a store failure worth retrying.
    async fn transition_for(
        &self,
        purpose: &CheckoutPurpose,
        session_id: &str,
    ) -> Result<Result<PaymentTransition, String>, StoreError> {
        let transition = match purpose {
            CheckoutPurpose::Booking(booking) => {
                let destination = self.store.find_destination(booking.destination_id).await?;
                if !destination.is_some_and(|d| d.tenant_id == booking.tenant_id) {
                    return Ok(Err(format!(
                        "destination {} does not belong to tenant {}",
                        booking.destination_id, booking.tenant_id
                    )));
                }
                match Reservation::materialize_paid(booking.clone(), session_id, Utc::now()) {
                    Ok(reservation) => PaymentTransition::Materialize { reservation },
                    Err(error) => return Ok(Err(error.to_string())),
                }
            }
            CheckoutPurpose::Reservation { reservation_id, .. } => PaymentTransition::MarkPaid {
                reservation_id: *reservation_id,
                session_id: session_id.to_string(),
            },
            CheckoutPurpose::Remainder { reservation_id, .. } => {
                PaymentTransition::MarkRemainderPaid {
                    reservation_id: *reservation_id,
                }
            }
        };
        Ok(Ok(transition))
    }

    async fn record_failure(
        &self,
        event: &ProviderEvent,
        session: CheckoutSessionObject,
    ) -> Result<WebhookOutcome, WebhookError> {
        if !self.record(event, EventOutcome::Ignored).await? {
            return Ok(WebhookOutcome::Duplicate);
        }

        let purpose = SessionMetadata::from(session.metadata)
            .purpose()
            .ok()
            .flatten();
        if let Some(purpose) = purpose {
            let description = match &purpose {
                CheckoutPurpose::Booking(booking) => format!(
                    "Checkout by {} for {} on {} did not complete ({}).",
                    booking.traveler.name,
                    booking.party.total(),
                    booking.departure_date,
                    event.event_type
                ),
                CheckoutPurpose::Reservation { reservation_id, .. }
                | CheckoutPurpose::Remainder { reservation_id, .. } => format!(
                    "Payment for reservation {reservation_id} did not complete ({}).",
                    event.event_type
                ),
            };
            self.notifications
                .dispatch(Notification::new(
                    purpose.tenant_id(),
                    NotificationKind::PaymentFailed,
                    "Payment failed",
                    description,
                    reservation_link(&purpose),
                ))
                .await;
        }
        Ok(WebhookOutcome::Ignored)
    }

    async fn reject(
        &self,
        event: &ProviderEvent,
        tenant_id: Option<TenantId>,
        reason: String,
    ) -> Result<WebhookOutcome, WebhookError> {
        tracing::warn!(%reason, "payment rejected");
        if !self.record(event, EventOutcome::Rejected).await? {
            return Ok(WebhookOutcome::Duplicate);
        }

        if let Some(tenant_id) = tenant_id {
            self.notifications
                .dispatch(Notification::new(
                    tenant_id,
                    NotificationKind::BookingRejected,
                    "Paid booking could not be confirmed",
                    format!("Event {} could not be applied: {reason}", event.id),
                    "/admin/reservations",
                ))
                .await;
        }
        Ok(WebhookOutcome::Rejected { reason })
    }

    async fn record(&self, event: &ProviderEvent, outcome: EventOutcome) -> Result<bool, StoreError> {
        self.store
            .record_event(ProcessedEvent::new(&event.id, &event.event_type, outcome))
            .await
    }
}

fn reservation_link(purpose: &CheckoutPurpose) -> String {
    match purpose {
        CheckoutPurpose::Booking(_) => "/admin/reservations".to_string(),
        CheckoutPurpose::Reservation { reservation_id, .. }
        | CheckoutPurpose::Remainder { reservation_id, .. } => {
            format!("/admin/reservations/{reservation_id}")
        }
    }
}

fn paid_notification(purpose: &CheckoutPurpose, reservation: &Reservation) -> Notification {
    let (kind, title) = match purpose {
        CheckoutPurpose::Remainder { .. } => {
            (NotificationKind::RemainderPaid, "Remaining balance paid")
        }
        _ if reservation.booking_model.is_deposit() => {
            (NotificationKind::DepositPaid, "Deposit received")
        }
        _ => (NotificationKind::BookingPaid, "New paid booking"),
    };
    Notification::new(
        reservation.tenant_id,
        kind,
        title,
        format!(
            "{} ({} travelers) on {}",
            reservation.traveler.name,
            reservation.party.total(),
            reservation.departure_date
        ),
        format!("/admin/reservations/{}", reservation.id),
    )
}
