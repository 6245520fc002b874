//! Departure capacity and derived availability status.

use chrono::NaiveDate;
use common::DestinationId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Capacities at or below this value (and above zero) are low availability.
pub const LOW_AVAILABILITY_THRESHOLD: u32 = 3;

/// Availability status of a departure.
///
/// Always derived from the remaining capacity:
/// ```text
/// 0        ──► SoldOut
/// 1..=3    ──► LowAvailability
/// 4..      ──► Confirmed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureStatus {
    Confirmed,
    LowAvailability,
    SoldOut,
}

impl DepartureStatus {
    /// Derives the status from a remaining capacity.
    pub const fn from_capacity(capacity: u32) -> Self {
        if capacity == 0 {
            DepartureStatus::SoldOut
        } else if capacity <= LOW_AVAILABILITY_THRESHOLD {
            DepartureStatus::LowAvailability
        } else {
            DepartureStatus::Confirmed
        }
    }

    /// Returns the persisted name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            DepartureStatus::Confirmed => "confirmed",
            DepartureStatus::LowAvailability => "low_availability",
            DepartureStatus::SoldOut => "sold_out",
        }
    }
}

impl std::fmt::Display for DepartureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DepartureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(DepartureStatus::Confirmed),
            "low_availability" => Ok(DepartureStatus::LowAvailability),
            "sold_out" => Ok(DepartureStatus::SoldOut),
            other => Err(format!("unknown departure status: {other}")),
        }
    }
}

/// A scheduled date-instance of a destination with finite capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    pub destination_id: DestinationId,
    pub date: NaiveDate,
    capacity: u32,
    status: DepartureStatus,
    pub base_price: Money,
}

impl Departure {
    /// Creates a departure; the status is derived from `capacity`.
    pub fn new(destination_id: DestinationId, date: NaiveDate, capacity: u32, base_price: Money) -> Self {
        Self {
            destination_id,
            date,
            capacity,
            status: DepartureStatus::from_capacity(capacity),
            base_price,
        }
    }

    /// Returns the remaining capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the availability status.
    pub fn status(&self) -> DepartureStatus {
        self.status
    }

    /// Returns true if `party_size` seats can still be taken.
    pub fn can_accommodate(&self, party_size: u32) -> bool {
        party_size <= self.capacity
    }

    /// Takes `party_size` seats if available, recomputing the status.
    ///
    /// Returns false and leaves the departure untouched when capacity is
    /// insufficient; capacity never goes below zero.
    pub fn try_take(&mut self, party_size: u32) -> bool {
        match self.capacity.checked_sub(party_size) {
            Some(remaining) => {
                self.set_capacity(remaining);
                true
            }
            None => false,
        }
    }

    fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
        self.status = DepartureStatus::from_capacity(capacity);
    }
}
