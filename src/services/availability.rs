use std::sync::Arc;

use chrono::Duration;

use crate::db::KvStore;
use crate::services::guesty::{AvailabilitySource, UpstreamDay};

pub const CACHE_TTL_HOURS: i64 = 24;
const KEY_PREFIX: &str = "availability:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Upstream failed and an expired entry was served instead.
    Stale,
    /// The cache store itself failed; data came straight from upstream.
    Bypass,
}

#[derive(Debug, Clone)]
pub struct MonthAvailability {
    pub days: Vec<UpstreamDay>,
    pub status: CacheStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("invalid month: {0}-{1}")]
    InvalidMonth(i32, u32),

    #[error("availability upstream failed: {0}")]
    Upstream(anyhow::Error),
}

/// Read-through cache keyed by (year, month) in front of the upstream
/// calendar.
#[derive(Clone)]
pub struct AvailabilityCache {
    kv: KvStore,
    source: Arc<dyn AvailabilitySource>,
}

pub fn cache_key(year: i32, month: u32) -> String {
    format!("{KEY_PREFIX}{year:04}-{month:02}")
}

impl AvailabilityCache {
    pub fn new(kv: KvStore, source: Arc<dyn AvailabilitySource>) -> Self {
        Self { kv, source }
    }

    pub async fn get_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthAvailability, AvailabilityError> {
        if !(1..=12).contains(&month) {
            return Err(AvailabilityError::InvalidMonth(year, month));
        }
        let key = cache_key(year, month);

        let mut store_ok = true;
        match self.kv.get_fresh(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<UpstreamDay>>(&raw) {
                Ok(days) => {
                    tracing::debug!(%key, "availability cache hit");
                    return Ok(MonthAvailability {
                        days,
                        status: CacheStatus::Hit,
                    });
                }
                Err(e) => tracing::warn!(%key, error = %e, "discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => {
                store_ok = false;
                tracing::warn!(%key, error = %e, "availability cache unavailable, going upstream");
            }
        }

        match self.source.fetch_month(year, month).await {
            Ok(days) => {
                if store_ok {
                    store_ok = self.store(&key, &days);
                }
                let status = if store_ok {
                    CacheStatus::Miss
                } else {
                    CacheStatus::Bypass
                };
                Ok(MonthAvailability { days, status })
            }
            Err(e) => {
                if let Some(days) = self.stale(&key) {
                    tracing::warn!(%key, error = %e, "upstream failed, serving stale availability");
                    return Ok(MonthAvailability {
                        days,
                        status: CacheStatus::Stale,
                    });
                }
                tracing::error!(%key, error = %e, "availability upstream failed");
                Err(AvailabilityError::Upstream(e))
            }
        }
    }

    pub fn invalidate(&self, year: i32, month: u32) -> anyhow::Result<bool> {
        self.kv.delete(&cache_key(year, month))
    }

    pub fn invalidate_all(&self) -> anyhow::Result<usize> {
        self.kv.delete_prefix(KEY_PREFIX)
    }

    fn store(&self, key: &str, days: &[UpstreamDay]) -> bool {
        let result = serde_json::to_string(days)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.kv.set(key, &raw, Duration::hours(CACHE_TTL_HOURS)));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to populate availability cache");
                false
            }
        }
    }

    fn stale(&self, key: &str) -> Option<Vec<UpstreamDay>> {
        let raw = self.kv.get_stale(key).ok()??;
        serde_json::from_str(&raw).ok()
    }
}
