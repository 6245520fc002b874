//! Reservation payment-status state machine.

use serde::{Deserialize, Serialize};

/// Payment status of a reservation.
///
/// State transitions:
/// ```text
/// (no row) ───────────────────────────┐
///                                     ▼
/// PendingConfirmation ──┬──────────► Paid ──┬──► Reviewed ──► Cancelled
/// Pending ──────────────┘                   └──────────────────► Cancelled
/// ```
/// `Pending` is a legacy pre-payment state and behaves like
/// `PendingConfirmation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Requested by the traveler, nothing collected yet.
    #[default]
    PendingConfirmation,

    /// Awaiting payment.
    Pending,

    /// Payment (or deposit) received.
    Paid,

    /// Reviewed by the agency after payment.
    Reviewed,

    /// Cancelled (terminal state).
    Cancelled,
}

impl PaymentStatus {
    /// Returns true if a successful payment may move this reservation to `Paid`.
    pub fn can_mark_paid(&self) -> bool {
        matches!(
            self,
            PaymentStatus::PendingConfirmation | PaymentStatus::Pending
        )
    }

    /// Returns true if a payment has been collected in this state.
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Reviewed)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        match next {
            PaymentStatus::Paid => self.can_mark_paid(),
            PaymentStatus::Reviewed => matches!(self, PaymentStatus::Paid),
            PaymentStatus::Cancelled => self.is_paid(),
            PaymentStatus::PendingConfirmation | PaymentStatus::Pending => false,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Cancelled)
    }

    /// Returns the persisted name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PendingConfirmation => "pending_confirmation",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Reviewed => "reviewed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_confirmation" => Ok(PaymentStatus::PendingConfirmation),
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "reviewed" => Ok(PaymentStatus::Reviewed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentStatus; 5] = [
        PaymentStatus::PendingConfirmation,
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Reviewed,
        PaymentStatus::Cancelled,
    ];

    #[test]
    fn default_is_pending_confirmation() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::PendingConfirmation);
    }

    #[test]
    fn only_pre_payment_states_can_be_paid() {
        assert!(PaymentStatus::PendingConfirmation.can_mark_paid());
        assert!(PaymentStatus::Pending.can_mark_paid());
        assert!(!PaymentStatus::Paid.can_mark_paid());
        assert!(!PaymentStatus::Reviewed.can_mark_paid());
        assert!(!PaymentStatus::Cancelled.can_mark_paid());
    }

    #[test]
    fn transitions() {
        use PaymentStatus::*;
        assert!(PendingConfirmation.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Reviewed));
        assert!(Paid.can_transition_to(Cancelled));
        assert!(Reviewed.can_transition_to(Cancelled));

        assert!(!PendingConfirmation.can_transition_to(Reviewed));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(PendingConfirmation));
        assert!(!Reviewed.can_transition_to(Paid));
    }

    #[test]
    fn nothing_leaves_cancelled() {
        for next in ALL {
            assert!(!PaymentStatus::Cancelled.can_transition_to(next));
        }
        assert!(PaymentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::PendingConfirmation).unwrap();
        assert_eq!(json, "\"pending_confirmation\"");
    }
}
