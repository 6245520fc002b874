//! Agency-facing notifications emitted after payment state changes.

use chrono::{DateTime, Utc};
use common::TenantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened, from the agency's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingPaid,
    DepositPaid,
    RemainderPaid,
    PaymentFailed,
    BookingRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingPaid => "booking_paid",
            NotificationKind::DepositPaid => "deposit_paid",
            NotificationKind::RemainderPaid => "remainder_paid",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::BookingRejected => "booking_rejected",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured notification scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    /// Deep link into the agency back office.
    pub link: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: TenantId,
        kind: NotificationKind,
        title: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            kind,
            title: title.into(),
            description: description.into(),
            link: link.into(),
            created_at: Utc::now(),
        }
    }
}
