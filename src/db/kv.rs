use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Expiring key-value store on the `kv_cache` table.
///
/// Expired rows are kept until overwritten so that callers can fall back
/// to a stale value when the source of truth is down.
#[derive(Clone)]
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
}

impl KvStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("kv store lock poisoned"))
    }

    /// Value for `key` if present and not yet expired.
    pub fn get_fresh(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Utc::now().naive_utc().format(TS_FORMAT).to_string();
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Value for `key` regardless of expiry.
    pub fn get_stale(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        self.set_until(key, value, Utc::now().naive_utc() + ttl)
    }

    pub fn set_until(
        &self,
        key: &str,
        value: &str,
        expires_at: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let expires_at = expires_at.format(TS_FORMAT).to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_cache (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let count = conn.execute("DELETE FROM kv_cache WHERE key = ?1", params![key])?;
        Ok(count > 0)
    }

    pub fn delete_prefix(&self, prefix: &str) -> anyhow::Result<usize> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let conn = self.lock()?;
        let count = conn.execute(
            "DELETE FROM kv_cache WHERE key LIKE ?1 ESCAPE '\\'",
            params![pattern],
        )?;
        Ok(count)
    }
}
