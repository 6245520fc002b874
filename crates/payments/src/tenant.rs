//! Maps an incoming request to exactly one tenant.

use std::sync::Arc;

use booking_store::BookingStore;
use common::TenantId;
use domain::Tenant;

use crate::error::TenantError;

/// Resolves the tenant for a request from its host or an explicit id.
///
/// There is no default tenant: a request that matches nothing fails.
pub struct TenantResolver<S: BookingStore> {
    store: Arc<S>,
    allow_override: bool,
}

impl<S: BookingStore> TenantResolver<S> {
    pub fn new(store: Arc<S>, allow_override: bool) -> Self {
        Self {
            store,
            allow_override,
        }
    }

    /// Resolves the tenant.
    ///
    /// An override id wins over the host when overrides are allowed. When
    /// they are not, the override is ignored and the host decides.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        host: Option<&str>,
        override_id: Option<TenantId>,
    ) -> Result<Tenant, TenantError> {
        let tenant = match override_id.filter(|_| self.allow_override) {
            Some(id) => self
                .store
                .find_tenant(id)
                .await?
                .ok_or_else(|| TenantError::NotFound(id.to_string()))?,
            None => {
                let domain = host
                    .map(normalize_host)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| TenantError::NotFound("missing host".to_string()))?;
                let found = self.store.find_tenant_by_domain(&domain).await?;
                found.ok_or(TenantError::NotFound(domain))?
            }
        };

        if !tenant.active {
            return Err(TenantError::Inactive(tenant.id));
        }

        tracing::debug!(tenant_id = %tenant.id, "tenant resolved");
        Ok(tenant)
    }
}

/// Lowercases a host and strips the port and any trailing dot.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}
