//! Checkout session metadata.
//!
//! Everything the webhook processor needs to act on a completed session
//! travels in the session's string metadata, since an immediate-payment
//! booking has no database row until the payment succeeds.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use common::{DestinationId, ReservationId, TenantId};
use domain::{Money, NewBooking, PartySize, Traveler};

use crate::error::MetadataError;

/// Provider limit on the number of metadata keys.
pub const MAX_KEYS: usize = 50;
/// Provider limit on the length of a metadata key.
pub const MAX_KEY_LEN: usize = 40;
/// Provider limit on the length of a metadata value.
pub const MAX_VALUE_LEN: usize = 500;

const KIND: &str = "kind";
const TENANT_ID: &str = "tenant_id";
const RESERVATION_ID: &str = "reservation_id";
const DESTINATION_ID: &str = "destination_id";
const DEPARTURE_DATE: &str = "departure_date";
const ADULTS: &str = "adults";
const CHILDREN: &str = "children";
const TRAVELER_NAME: &str = "traveler_name";
const TRAVELER_EMAIL: &str = "traveler_email";
const TRAVELER_PHONE: &str = "traveler_phone";
const TOTAL_MINOR: &str = "total_minor";

/// What a checkout session pays for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPurpose {
    /// Immediate payment; the reservation is created from the metadata.
    Booking(NewBooking),
    /// Payment for an existing reservation (deposit or full amount).
    Reservation {
        /// Tenant owning the reservation.
        tenant_id: TenantId,
        /// Reservation marked paid when the session completes.
        reservation_id: ReservationId,
    },
    /// Remaining balance of a deposit booking.
    Remainder {
        /// Tenant owning the reservation.
        tenant_id: TenantId,
        /// Reservation whose remainder is flagged paid.
        reservation_id: ReservationId,
    },
}

impl CheckoutPurpose {
    /// Tenant the payment belongs to.
    pub fn tenant_id(&self) -> TenantId {
        match self {
            CheckoutPurpose::Booking(booking) => booking.tenant_id,
            CheckoutPurpose::Reservation { tenant_id, .. }
            | CheckoutPurpose::Remainder { tenant_id, .. } => *tenant_id,
        }
    }

    /// Value of the `kind` metadata key.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutPurpose::Booking(_) => "booking",
            CheckoutPurpose::Reservation { .. } => "reservation",
            CheckoutPurpose::Remainder { .. } => "remainder",
        }
    }
}

/// String key/value pairs attached to a provider session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata(BTreeMap<String, String>);

impl SessionMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for an immediate-payment booking.
    pub fn for_booking(booking: &NewBooking) -> Self {
        let mut metadata = Self::new();
        metadata.insert(KIND, "booking");
        metadata.insert(TENANT_ID, booking.tenant_id.to_string());
        metadata.insert(DESTINATION_ID, booking.destination_id.to_string());
        metadata.insert(DEPARTURE_DATE, booking.departure_date.to_string());
        metadata.insert(ADULTS, booking.party.adults.to_string());
        metadata.insert(CHILDREN, booking.party.children.to_string());
        metadata.insert(TRAVELER_NAME, booking.traveler.name.clone());
        metadata.insert(TRAVELER_EMAIL, booking.traveler.email.clone());
        if let Some(phone) = &booking.traveler.phone {
            metadata.insert(TRAVELER_PHONE, phone.clone());
        }
        metadata.insert(TOTAL_MINOR, booking.total.minor().to_string());
        metadata
    }

    /// Metadata describing `purpose`.
    pub fn for_purpose(purpose: &CheckoutPurpose) -> Self {
        let (kind, tenant_id, reservation_id) = match purpose {
            CheckoutPurpose::Booking(booking) => return Self::for_booking(booking),
            CheckoutPurpose::Reservation {
                tenant_id,
                reservation_id,
            } => ("reservation", tenant_id, reservation_id),
            CheckoutPurpose::Remainder {
                tenant_id,
                reservation_id,
            } => ("remainder", tenant_id, reservation_id),
        };
        let mut metadata = Self::new();
        metadata.insert(KIND, kind);
        metadata.insert(TENANT_ID, tenant_id.to_string());
        metadata.insert(RESERVATION_ID, reservation_id.to_string());
        metadata
    }

    /// Sets `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no key is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Checks the provider limits on key count and key/value length.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.0.len() > MAX_KEYS {
            return Err(MetadataError::TooManyKeys {
                count: self.0.len(),
                max: MAX_KEYS,
            });
        }
        for (key, value) in &self.0 {
            if key.chars().count() > MAX_KEY_LEN {
                return Err(MetadataError::KeyTooLong { key: key.clone() });
            }
            if value.chars().count() > MAX_VALUE_LEN {
                return Err(MetadataError::ValueTooLong { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Reads the purpose back. Returns `Ok(None)` for sessions this engine
    /// did not create (no `kind` key).
    pub fn purpose(&self) -> Result<Option<CheckoutPurpose>, MetadataError> {
        let Some(kind) = self.get(KIND) else {
            return Ok(None);
        };
        let tenant_id: TenantId = self.parse(TENANT_ID)?;

        let purpose = match kind {
            "booking" => CheckoutPurpose::Booking(NewBooking {
                tenant_id,
                destination_id: self.parse::<DestinationId>(DESTINATION_ID)?,
                departure_date: self.parse::<NaiveDate>(DEPARTURE_DATE)?,
                traveler: Traveler::new(
                    self.required(TRAVELER_NAME)?,
                    self.required(TRAVELER_EMAIL)?,
                    self.get(TRAVELER_PHONE).map(str::to_string),
                ),
                party: PartySize::new(self.parse(ADULTS)?, self.parse(CHILDREN)?),
                total: Money::from_minor(self.parse(TOTAL_MINOR)?),
                deposit: None,
            }),
            "reservation" => CheckoutPurpose::Reservation {
                tenant_id,
                reservation_id: self.parse(RESERVATION_ID)?,
            },
            "remainder" => CheckoutPurpose::Remainder {
                tenant_id,
                reservation_id: self.parse(RESERVATION_ID)?,
            },
            other => {
                return Err(MetadataError::Invalid {
                    field: KIND,
                    value: other.to_string(),
                });
            }
        };
        Ok(Some(purpose))
    }

    fn required(&self, field: &'static str) -> Result<&str, MetadataError> {
        self.get(field).ok_or(MetadataError::Missing(field))
    }

    fn parse<T: std::str::FromStr>(&self, field: &'static str) -> Result<T, MetadataError> {
        let value = self.required(field)?;
        value.parse().map_err(|_| MetadataError::Invalid {
            field,
            value: value.to_string(),
        })
    }
}

impl From<BTreeMap<String, String>> for SessionMetadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for SessionMetadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> NewBooking {
        NewBooking {
            tenant_id: TenantId::new(),
            destination_id: DestinationId::new(),
            departure_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            traveler: Traveler::new("Tomás Rivas", "tomas@example.com", None),
            party: PartySize::new(2, 1),
            total: Money::from_minor(299_800),
            deposit: None,
        }
    }

    #[test]
    fn booking_purpose_survives_the_provider() {
        let original = booking();
        let metadata = SessionMetadata::for_booking(&original);
        assert!(metadata.get(TRAVELER_PHONE).is_none());

        let purpose = metadata.purpose().unwrap().unwrap();
        assert_eq!(purpose, CheckoutPurpose::Booking(original));
    }

    #[test]
    fn remainder_purpose_keeps_ids() {
        let purpose = CheckoutPurpose::Remainder {
            tenant_id: TenantId::new(),
            reservation_id: ReservationId::new(),
        };
        let metadata = SessionMetadata::for_purpose(&purpose);
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.purpose().unwrap(), Some(purpose));
    }

    #[test]
    fn foreign_sessions_have_no_purpose() {
        let mut metadata = SessionMetadata::new();
        metadata.insert("order", "42");
        assert_eq!(metadata.purpose().unwrap(), None);
    }

    #[test]
    fn missing_and_invalid_fields() {
        let mut metadata = SessionMetadata::new();
        metadata.insert(KIND, "remainder");
        metadata.insert(TENANT_ID, TenantId::new().to_string());
        assert_eq!(
            metadata.purpose().unwrap_err(),
            MetadataError::Missing(RESERVATION_ID)
        );

        metadata.insert(RESERVATION_ID, "not-a-uuid");
        assert!(matches!(
            metadata.purpose().unwrap_err(),
            MetadataError::Invalid {
                field: RESERVATION_ID,
                ..
            }
        ));

        metadata.insert(KIND, "gift_card");
        assert!(matches!(
            metadata.purpose().unwrap_err(),
            MetadataError::Invalid { field: KIND, .. }
        ));
    }

    #[test]
    fn limits_are_enforced() {
        let mut metadata = SessionMetadata::for_booking(&booking());
        assert!(metadata.validate().is_ok());

        metadata.insert(TRAVELER_NAME, "x".repeat(MAX_VALUE_LEN + 1));
        assert_eq!(
            metadata.validate().unwrap_err(),
            MetadataError::ValueTooLong {
                key: TRAVELER_NAME.to_string()
            }
        );

        let mut metadata = SessionMetadata::new();
        metadata.insert("k".repeat(MAX_KEY_LEN + 1), "v");
        assert!(matches!(
            metadata.validate().unwrap_err(),
            MetadataError::KeyTooLong { .. }
        ));

        let metadata: SessionMetadata = (0..=MAX_KEYS)
            .map(|i| (format!("key_{i}"), "v".to_string()))
            .collect();
        assert!(matches!(
            metadata.validate().unwrap_err(),
            MetadataError::TooManyKeys { count: 51, .. }
        ));
    }
}
