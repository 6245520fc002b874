//! Tenant and destination records.
//!
//! Both are owned by onboarding and content flows outside the engine and are
//! only ever read here.

use common::{DestinationId, TenantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::ConnectedAccount;

/// A travel agency running a storefront on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Storefront host, stored lowercase without port.
    pub domain: String,
    /// Stripe Connect account id, if the agency has onboarded one.
    pub stripe_account_id: Option<String>,
    pub charges_enabled: bool,
    /// Platform commission as a fraction (e.g. `0.03`).
    pub commission_rate: Decimal,
    pub active: bool,
}

impl Tenant {
    /// Returns the connected payment sub-account, if one exists.
    ///
    /// The account is returned regardless of its charge capability; callers
    /// decide whether a disabled account blocks the operation.
    pub fn connected_account(&self) -> Option<ConnectedAccount> {
        self.stripe_account_id
            .as_ref()
            .map(|account_id| ConnectedAccount {
                account_id: account_id.clone(),
                charges_enabled: self.charges_enabled,
            })
    }

    /// Returns true if the tenant has a connected account that cannot take charges yet.
    pub fn has_disabled_connected_account(&self) -> bool {
        self.stripe_account_id.is_some() && !self.charges_enabled
    }
}

/// A bookable destination owned by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub tenant_id: TenantId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(account: Option<&str>, charges_enabled: bool) -> Tenant {
        Tenant {
            id: TenantId::new(),
            domain: "agency.example.com".to_string(),
            stripe_account_id: account.map(String::from),
            charges_enabled,
            commission_rate: Decimal::new(3, 2),
            active: true,
        }
    }

    #[test]
    fn connected_account_absent_without_stripe_id() {
        assert!(tenant(None, true).connected_account().is_none());
        assert!(!tenant(None, false).has_disabled_connected_account());
    }

    #[test]
    fn connected_account_carries_charge_flag() {
        let account = tenant(Some("acct_123"), false).connected_account().unwrap();
        assert_eq!(account.account_id, "acct_123");
        assert!(!account.charges_enabled);
        assert!(tenant(Some("acct_123"), false).has_disabled_connected_account());
        assert!(!tenant(Some("acct_123"), true).has_disabled_connected_account());
    }
}
