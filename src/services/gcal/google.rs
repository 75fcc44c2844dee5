use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Timelike};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{CalendarEvent, CalendarProvider, NewEvent};
use crate::db::KvStore;
use crate::services::token::TokenCache;

const API_BASE: &str = "https://www.googleapis.com";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google Calendar REST client using a long-lived refresh token.
pub struct GoogleCalendarClient {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    calendar_id: String,
    api_base: String,
    token_url: String,
    token: TokenCache,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Deserialize)]
struct EventItem {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<String>,
    start: EventTime,
    end: EventTime,
}

#[derive(Deserialize)]
struct EventTime {
    date: Option<NaiveDate>,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

#[derive(Deserialize)]
struct InsertedEvent {
    id: String,
}

impl EventTime {
    /// Calendar day this bound falls on. Timed ends that are not exactly
    /// midnight occupy their last day, so they round up.
    fn to_date(&self, is_end: bool) -> Option<NaiveDate> {
        if let Some(date) = self.date {
            return Some(date);
        }
        let dt = DateTime::parse_from_rfc3339(self.date_time.as_deref()?).ok()?;
        let date = dt.date_naive();
        if is_end && (dt.hour(), dt.minute(), dt.second()) != (0, 0, 0) {
            return Some(date + Duration::days(1));
        }
        Some(date)
    }
}

impl GoogleCalendarClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        refresh_token: String,
        calendar_id: String,
        kv: Option<KvStore>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            calendar_id,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            token: TokenCache::new("token:google", kv),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.refresh_token.is_empty() && !self.client_id.is_empty()
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        anyhow::ensure!(self.is_configured(), "Google Calendar is not configured");
        self.token
            .get_or_fetch(|| async {
                let resp: TokenResponse = self
                    .client
                    .post(&self.token_url)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", self.client_id.as_str()),
                        ("client_secret", self.client_secret.as_str()),
                        ("refresh_token", self.refresh_token.as_str()),
                    ])
                    .send()
                    .await
                    .context("failed to call Google token endpoint")?
                    .error_for_status()
                    .context("Google token endpoint returned error")?
                    .json()
                    .await
                    .context("failed to parse Google token response")?;
                anyhow::Ok((resp.access_token, resp.expires_in))
            })
            .await
    }

    fn events_url(&self, event_id: Option<&str>) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base).context("invalid calendar API base")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("calendar API base cannot have a path"))?;
            segments.extend(["calendar", "v3", "calendars", &self.calendar_id, "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn check(&self, resp: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            self.token.invalidate().await;
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Calendar {what} failed ({status}): {body}");
        }
        Ok(resp)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(self.events_url(None)?)
            .bearer_auth(&token)
            .query(&[
                ("timeMin", format!("{}T00:00:00Z", start.format("%Y-%m-%d"))),
                ("timeMax", format!("{}T00:00:00Z", end.format("%Y-%m-%d"))),
                ("singleEvents", "true".to_string()),
                ("maxResults", "2500".to_string()),
            ])
            .send()
            .await
            .context("failed to call Google Calendar")?;

        let list: EventList = self
            .check(resp, "list")
            .await?
            .json()
            .await
            .context("failed to parse Google Calendar events")?;

        Ok(list
            .items
            .into_iter()
            .filter(|e| e.status.as_deref() != Some("cancelled"))
            .filter_map(|e| {
                Some(CalendarEvent {
                    start: e.start.to_date(false)?,
                    end: e.end.to_date(true)?,
                    summary: e.summary.unwrap_or_default(),
                    id: e.id,
                })
            })
            .collect())
    }

    async fn insert_event(&self, event: &NewEvent) -> anyhow::Result<String> {
        let token = self.access_token().await?;
        let body = json!({
            "summary": event.summary,
            "description": event.description,
            "start": { "date": event.start.format("%Y-%m-%d").to_string() },
            "end": { "date": event.end.format("%Y-%m-%d").to_string() },
            "transparency": "opaque",
        });

        let resp = self
            .client
            .post(self.events_url(None)?)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .context("failed to call Google Calendar")?;

        let created: InsertedEvent = self
            .check(resp, "insert")
            .await?
            .json()
            .await
            .context("failed to parse inserted event")?;

        tracing::info!(event_id = %created.id, "created calendar event");
        Ok(created.id)
    }

    async fn patch_summary(&self, event_id: &str, summary: &str) -> anyhow::Result<()> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .patch(self.events_url(Some(event_id))?)
            .bearer_auth(&token)
            .json(&json!({ "summary": summary }))
            .send()
            .await
            .context("failed to call Google Calendar")?;
        self.check(resp, "patch").await?;
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> anyhow::Result<()> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .delete(self.events_url(Some(event_id))?)
            .bearer_auth(&token)
            .send()
            .await
            .context("failed to call Google Calendar")?;

        // already deleted
        if resp.status() == StatusCode::GONE || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.check(resp, "delete").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleCalendarClient {
        GoogleCalendarClient::new(
            "id".into(),
            "secret".into(),
            "refresh".into(),
            "family@group.calendar.google.com".into(),
            None,
        )
    }

    #[test]
    fn test_events_url_escapes_calendar_id() {
        let url = client().events_url(Some("evt1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/family@group.calendar.google.com/events/evt1"
        );
    }

    #[test]
    fn test_parse_all_day_and_timed_events() {
        let raw = r#"{"items":[
            {"id":"a","summary":"Family week","start":{"date":"2026-07-01"},"end":{"date":"2026-07-08"}},
            {"id":"b","summary":"Owner visit","start":{"dateTime":"2026-07-10T15:00:00+02:00"},"end":{"dateTime":"2026-07-12T11:00:00+02:00"}},
            {"id":"c","status":"cancelled","start":{"date":"2026-07-20"},"end":{"date":"2026-07-21"}}
        ]}"#;
        let list: EventList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.items.len(), 3);

        let timed = &list.items[1];
        assert_eq!(
            timed.start.to_date(false),
            NaiveDate::from_ymd_opt(2026, 7, 10)
        );
        assert_eq!(timed.end.to_date(true), NaiveDate::from_ymd_opt(2026, 7, 13));
        assert!(list.items[2].summary.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_client_errors() {
        let client = GoogleCalendarClient::new(
            String::new(),
            String::new(),
            String::new(),
            "primary".into(),
            None,
        );
        assert!(!client.is_configured());
        let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        assert!(client.list_events(start, start).await.is_err());
    }
}
