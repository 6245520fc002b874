//! Commission pricing and Connect application-fee split.
//!
//! Pure functions only; nothing here talks to the payment provider.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

use crate::money::Money;

/// A tenant's payment sub-account on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedAccount {
    /// Provider id of the sub-account (`acct_...`).
    pub account_id: String,
    /// Whether the provider lets the sub-account receive charges.
    pub charges_enabled: bool,
}

/// Errors raised while pricing a charge.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The total was NaN or infinite.
    #[error("Total must be a finite number")]
    NonFiniteTotal,

    /// The total was zero or negative.
    #[error("Total must be greater than zero, got {0}")]
    NonPositiveTotal(String),

    /// The tenant's commission rate is outside `[0, 1]`.
    #[error("Commission rate must be between 0 and 1, got {0}")]
    InvalidCommissionRate(Decimal),

    /// The amount or fee does not fit in minor units.
    #[error("Amount too large to price")]
    Overflow,
}

/// How a single charge is collected and settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeBreakdown {
    /// Amount charged to the traveler.
    pub amount: Money,
    /// Platform commission, present only for split (Connect) charges.
    pub application_fee: Option<Money>,
    /// Sub-account receiving `amount - application_fee`.
    pub destination_account: Option<String>,
}

impl ChargeBreakdown {
    /// Returns the application fee, zero when funds are not split.
    pub fn application_fee_amount(&self) -> Money {
        self.application_fee.unwrap_or_default()
    }

    /// Returns the amount settled to the tenant's sub-account.
    pub fn tenant_settlement(&self) -> Money {
        match self.destination_account {
            Some(_) => self.amount - self.application_fee_amount(),
            None => Money::zero(),
        }
    }

    /// Returns true if funds are split between platform and tenant.
    pub fn is_split(&self) -> bool {
        self.destination_account.is_some()
    }
}

/// Prices a charge from a declared total in major currency units.
///
/// The total is validated before anything else so that non-finite and
/// non-positive amounts never reach the provider.
pub fn calculate_charge(
    total: f64,
    commission_rate: Decimal,
    account: Option<&ConnectedAccount>,
) -> Result<ChargeBreakdown, PricingError> {
    if !total.is_finite() {
        return Err(PricingError::NonFiniteTotal);
    }
    if total <= 0.0 {
        return Err(PricingError::NonPositiveTotal(total.to_string()));
    }
    let amount = Money::from_major(total).ok_or(PricingError::Overflow)?;
    price_amount(amount, commission_rate, account)
}

/// Prices a charge for an amount already expressed in minor units.
///
/// Used for deposit and remainder charges on existing reservations.
pub fn price_amount(
    amount: Money,
    commission_rate: Decimal,
    account: Option<&ConnectedAccount>,
) -> Result<ChargeBreakdown, PricingError> {
    if !amount.is_positive() {
        return Err(PricingError::NonPositiveTotal(amount.to_string()));
    }
    if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
        return Err(PricingError::InvalidCommissionRate(commission_rate));
    }

    match account {
        Some(account) if account.charges_enabled => Ok(ChargeBreakdown {
            amount,
            application_fee: Some(application_fee(amount, commission_rate)?),
            destination_account: Some(account.account_id.clone()),
        }),
        _ => Ok(ChargeBreakdown {
            amount,
            application_fee: None,
            destination_account: None,
        }),
    }
}

/// `round(amount * rate)` in minor units, halves rounded away from zero.
fn application_fee(amount: Money, commission_rate: Decimal) -> Result<Money, PricingError> {
    let fee = (Decimal::from(amount.minor()) * commission_rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::Overflow)?;
    Ok(Money::from_minor(fee))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> ConnectedAccount {
        ConnectedAccount {
            account_id: "acct_agency".to_string(),
            charges_enabled: true,
        }
    }

    fn rate(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn split_charge_for_enabled_account() {
        let charge = calculate_charge(1499.00, rate("0.03"), Some(&enabled())).unwrap();
        assert_eq!(charge.amount.minor(), 149_900);
        assert_eq!(charge.application_fee_amount().minor(), 4497);
        assert_eq!(charge.destination_account.as_deref(), Some("acct_agency"));
        assert_eq!(charge.tenant_settlement().minor(), 145_403);
        assert!(charge.is_split());
    }

    #[test]
    fn no_split_without_connected_account() {
        let charge = calculate_charge(1499.00, rate("0.03"), None).unwrap();
        assert_eq!(charge.amount.minor(), 149_900);
        assert_eq!(charge.application_fee_amount(), Money::zero());
        assert!(charge.destination_account.is_none());
        assert_eq!(charge.tenant_settlement(), Money::zero());
    }

    #[test]
    fn no_split_for_disabled_account() {
        let account = ConnectedAccount {
            charges_enabled: false,
            ..enabled()
        };
        let charge = calculate_charge(100.0, rate("0.05"), Some(&account)).unwrap();
        assert!(!charge.is_split());
        assert_eq!(charge.application_fee_amount(), Money::zero());
    }

    #[test]
    fn fee_rounds_half_away_from_zero() {
        // 0.05 * 0.10 = 0.5 minor units
        let charge = price_amount(Money::from_minor(5), rate("0.10"), Some(&enabled())).unwrap();
        assert_eq!(charge.application_fee_amount().minor(), 1);

        let charge = price_amount(Money::from_minor(1234), rate("0.03"), Some(&enabled())).unwrap();
        // 37.02 -> 37
        assert_eq!(charge.application_fee_amount().minor(), 37);
    }

    #[test]
    fn fee_matches_rounded_product_across_rates() {
        for (minor, r) in [(100_000, "0"), (100_000, "1"), (99_999, "0.125"), (1, "0.5")] {
            let r = rate(r);
            let charge = price_amount(Money::from_minor(minor), r, Some(&enabled())).unwrap();
            let expected = (Decimal::from(minor) * r)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            assert_eq!(Decimal::from(charge.application_fee_amount().minor()), expected);
        }
    }

    #[test]
    fn rejects_zero_and_negative_totals() {
        assert!(matches!(
            calculate_charge(0.0, rate("0.03"), None),
            Err(PricingError::NonPositiveTotal(_))
        ));
        assert!(matches!(
            calculate_charge(-10.0, rate("0.03"), Some(&enabled())),
            Err(PricingError::NonPositiveTotal(_))
        ));
    }

    #[test]
    fn rejects_non_finite_totals() {
        assert_eq!(
            calculate_charge(f64::NAN, rate("0.03"), None),
            Err(PricingError::NonFiniteTotal)
        );
        assert_eq!(
            calculate_charge(f64::NEG_INFINITY, rate("0.03"), None),
            Err(PricingError::NonFiniteTotal)
        );
    }

    #[test]
    fn rejects_out_of_range_rate() {
        assert_eq!(
            calculate_charge(10.0, rate("1.5"), None),
            Err(PricingError::InvalidCommissionRate(rate("1.5")))
        );
        assert!(calculate_charge(10.0, rate("-0.01"), None).is_err());
    }
}
