use std::future::Future;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::KvStore;

/// Tokens are replaced this long before they actually expire.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Upper bound on a lifetime reported by a token endpoint.
const MAX_LIFETIME_SECS: i64 = 86_400 * 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    expires_at: NaiveDateTime,
}

impl CachedToken {
    fn is_usable(&self) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > Utc::now().naive_utc()
    }
}

/// Expiring OAuth access token, kept in memory and mirrored to the kv store
/// so a restart does not burn a fresh token.
pub struct TokenCache {
    key: String,
    kv: Option<KvStore>,
    current: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(key: impl Into<String>, kv: Option<KvStore>) -> Self {
        Self {
            key: key.into(),
            kv,
            current: Mutex::new(None),
        }
    }

    /// Returns a usable token, calling `fetch` only when neither memory nor
    /// the kv store has one. `fetch` yields the token and its lifetime in
    /// seconds. Concurrent callers wait on the same refresh.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> anyhow::Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<(String, i64)>>,
    {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref().filter(|t| t.is_usable()) {
            return Ok(token.access_token.clone());
        }

        if let Some(token) = self.load_persisted() {
            let access_token = token.access_token.clone();
            *current = Some(token);
            return Ok(access_token);
        }

        let (access_token, expires_in) = fetch().await?;
        let expires_in = expires_in.clamp(0, MAX_LIFETIME_SECS);
        let token = CachedToken {
            access_token: access_token.clone(),
            expires_at: Utc::now().naive_utc() + Duration::seconds(expires_in),
        };
        self.persist(&token, expires_in);
        *current = Some(token);

        tracing::info!(key = %self.key, expires_in, "fetched new access token");
        Ok(access_token)
    }

    /// Drops the cached token, e.g. after the upstream rejected it.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
        if let Some(kv) = &self.kv {
            if let Err(e) = kv.delete(&self.key) {
                tracing::warn!(error = %e, key = %self.key, "failed to drop persisted token");
            }
        }
    }

    fn load_persisted(&self) -> Option<CachedToken> {
        let kv = self.kv.as_ref()?;
        let raw = match kv.get_fresh(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "token store unavailable");
                return None;
            }
        };
        serde_json::from_str::<CachedToken>(&raw)
            .ok()
            .filter(|t| t.is_usable())
    }

    fn persist(&self, token: &CachedToken, expires_in: i64) {
        let Some(kv) = &self.kv else {
            return;
        };
        let result = serde_json::to_string(token)
            .map_err(anyhow::Error::from)
            .and_then(|raw| kv.set(&self.key, &raw, Duration::seconds(expires_in)));
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %self.key, "failed to persist access token");
        }
    }
}
