//! Fixed-window request limiting backed by the shared store.

use std::sync::Arc;

use booking_store::{BookingStore, StoreError};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { hits: u32 },
    Limited { limit: u32 },
}

/// Counts hits per key in one-minute windows.
///
/// The counters live in the store, so every instance sees the same totals.
pub struct RateLimiter<S: BookingStore> {
    store: Arc<S>,
    limit_per_minute: u32,
}

impl<S: BookingStore> RateLimiter<S> {
    /// A limit of zero disables limiting.
    pub fn new(store: Arc<S>, limit_per_minute: u32) -> Self {
        Self {
            store,
            limit_per_minute,
        }
    }

    pub async fn check(&self, key: &str) -> Result<RateDecision, StoreError> {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision, StoreError> {
        if self.limit_per_minute == 0 {
            return Ok(RateDecision::Allowed { hits: 0 });
        }

        let window_start = now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now);
        let hits = self.store.increment_rate_counter(key, window_start).await?;
        if hits > self.limit_per_minute {
            tracing::debug!(key, hits, "rate limit exceeded");
            Ok(RateDecision::Limited {
                limit: self.limit_per_minute,
            })
        } else {
            Ok(RateDecision::Allowed { hits })
        }
    }
}
