use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{AvailabilitySource, UpstreamDay};
use crate::db::KvStore;
use crate::models::month_range;
use crate::services::token::TokenCache;

const DEFAULT_BASE_URL: &str = "https://open-api.guesty.com";

pub struct GuestyClient {
    client_id: String,
    client_secret: String,
    listing_id: String,
    base_url: String,
    token: TokenCache,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct CalendarResponse {
    data: CalendarData,
}

#[derive(Deserialize)]
struct CalendarData {
    days: Vec<CalendarEntry>,
}

#[derive(Deserialize)]
struct CalendarEntry {
    date: NaiveDate,
    status: String,
    #[serde(rename = "reservationId", default)]
    reservation_id: Option<String>,
}

impl GuestyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        listing_id: String,
        kv: Option<KvStore>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            listing_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: TokenCache::new("token:guesty", kv),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        self.token
            .get_or_fetch(|| async {
                let resp: TokenResponse = self
                    .client
                    .post(format!("{}/oauth2/token", self.base_url))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("scope", "open-api"),
                        ("client_id", self.client_id.as_str()),
                        ("client_secret", self.client_secret.as_str()),
                    ])
                    .send()
                    .await
                    .context("failed to call Guesty token endpoint")?
                    .error_for_status()
                    .context("Guesty token endpoint returned error")?
                    .json()
                    .await
                    .context("failed to parse Guesty token response")?;
                anyhow::Ok((resp.access_token, resp.expires_in))
            })
            .await
    }
}

#[async_trait]
impl AvailabilitySource for GuestyClient {
    async fn fetch_month(&self, year: i32, month: u32) -> anyhow::Result<Vec<UpstreamDay>> {
        anyhow::ensure!(
            !self.client_id.is_empty() && !self.listing_id.is_empty(),
            "Guesty credentials are not configured"
        );
        let (first, last) =
            month_range(year, month).ok_or_else(|| anyhow::anyhow!("invalid month {year}-{month}"))?;

        let token = self.access_token().await?;
        let url = format!(
            "{}/v1/availability-pricing/api/calendar/listings/{}",
            self.base_url, self.listing_id
        );

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("startDate", first.format("%Y-%m-%d").to_string()),
                ("endDate", last.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await
            .context("failed to call Guesty calendar")?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            self.token.invalidate().await;
            anyhow::bail!("Guesty rejected the access token");
        }

        let data: CalendarResponse = resp
            .error_for_status()
            .context("Guesty calendar returned error")?
            .json()
            .await
            .context("failed to parse Guesty calendar response")?;

        tracing::debug!(year, month, days = data.data.days.len(), "fetched Guesty calendar");

        Ok(data
            .data
            .days
            .into_iter()
            .map(|d| UpstreamDay {
                date: d.date,
                available: d.status == "available",
                reservation_id: d.reservation_id,
            })
            .collect())
    }
}
