//! TTL policy applied to stored rows before they are served without going
//! upstream.

use chrono::{DateTime, Duration, Utc};

use crate::models::Ad;

/// Anything carrying the time it was last refreshed from upstream.
pub trait Refreshed {
    fn last_refreshed(&self) -> DateTime<Utc>;
}

impl Refreshed for Ad {
    fn last_refreshed(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::page_ads()
    }
}

impl FreshnessPolicy {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// 24 hours, the window for page-ads lookups.
    #[must_use]
    pub fn page_ads() -> Self {
        Self::new(Duration::hours(24))
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Oldest refresh time still considered fresh at `now`.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// True when `records` is non-empty and every record was refreshed at or
    /// after the cutoff.
    #[must_use]
    pub fn is_fresh<R: Refreshed>(&self, records: &[R], now: DateTime<Utc>) -> bool {
        let cutoff = self.cutoff(now);
        !records.is_empty() && records.iter().all(|r| r.last_refreshed() >= cutoff)
    }
}
