pub mod client;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of the property-management calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamDay {
    pub date: NaiveDate,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
}

#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Every day of the given month as the upstream sees it.
    async fn fetch_month(&self, year: i32, month: u32) -> anyhow::Result<Vec<UpstreamDay>>;
}
