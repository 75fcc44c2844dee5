pub mod google;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An all-day span on the owner's calendar. `end` is exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events overlapping `[start, end)`.
    async fn list_events(&self, start: NaiveDate, end: NaiveDate)
        -> anyhow::Result<Vec<CalendarEvent>>;

    /// Returns the new event's id.
    async fn insert_event(&self, event: &NewEvent) -> anyhow::Result<String>;

    async fn patch_summary(&self, event_id: &str, summary: &str) -> anyhow::Result<()>;

    async fn delete_event(&self, event_id: &str) -> anyhow::Result<()>;
}
