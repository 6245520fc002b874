//! Value objects for bookings.

use serde::{Deserialize, Serialize};

use super::ReservationError;

/// The traveler making a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traveler {
    /// Full name as given at checkout.
    pub name: String,
    /// Contact email, also sent to the provider as the customer email.
    pub email: String,
    /// Optional phone number; blank values are dropped.
    #[serde(default)]
    pub phone: Option<String>,
}

impl Traveler {
    /// Creates a traveler with trimmed fields.
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            phone: phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    /// Checks the traveler has a name and a plausible email address.
    pub fn validate(&self) -> Result<(), ReservationError> {
        if self.name.trim().is_empty() {
            return Err(ReservationError::MissingTravelerField("name"));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ReservationError::MissingTravelerField("email"));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(ReservationError::InvalidEmail(email.to_string())),
        }
    }
}

/// Number of travelers on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PartySize {
    /// Adult travelers.
    pub adults: u32,
    /// Child travelers; each takes a seat like an adult.
    #[serde(default)]
    pub children: u32,
}

impl PartySize {
    /// Creates a party; see [`PartySize::validate`] for the rules.
    pub fn new(adults: u32, children: u32) -> Self {
        Self { adults, children }
    }

    /// Total seats taken on the departure.
    pub fn total(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }

    /// Rejects a party with nobody in it.
    pub fn validate(&self) -> Result<(), ReservationError> {
        if self.total() == 0 {
            return Err(ReservationError::EmptyParty);
        }
        Ok(())
    }
}

/// How a reservation is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingModel {
    /// The whole total is collected in one checkout.
    #[default]
    FullPayment,
    /// A deposit up front, then a separate checkout for the remainder.
    DepositPlusRemainder,
}

impl BookingModel {
    /// Returns the persisted name of the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingModel::FullPayment => "full_payment",
            BookingModel::DepositPlusRemainder => "deposit_plus_remainder",
        }
    }

    /// Returns true if a remainder is collected after the deposit.
    pub fn is_deposit(&self) -> bool {
        matches!(self, BookingModel::DepositPlusRemainder)
    }
}

impl std::fmt::Display for BookingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_payment" => Ok(BookingModel::FullPayment),
            "deposit_plus_remainder" => Ok(BookingModel::DepositPlusRemainder),
            other => Err(format!("unknown booking model: {other}")),
        }
    }
}
