use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::KvStore;
use crate::services::availability::AvailabilityCache;
use crate::services::email::EmailProvider;
use crate::services::gcal::CalendarProvider;
use crate::services::guesty::AvailabilitySource;
use crate::services::payments::PaymentProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub availability: AvailabilityCache,
    pub calendar: Box<dyn CalendarProvider>,
    pub payments: Box<dyn PaymentProvider>,
    pub email: Box<dyn EmailProvider>,
}

impl AppState {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        config: AppConfig,
        source: Arc<dyn AvailabilitySource>,
        calendar: Box<dyn CalendarProvider>,
        payments: Box<dyn PaymentProvider>,
        email: Box<dyn EmailProvider>,
    ) -> Self {
        Self {
            availability: AvailabilityCache::new(KvStore::new(db.clone()), source),
            db,
            config,
            calendar,
            payments,
            email,
        }
    }

    /// Locks the database. Never hold the guard across an `.await`.
    pub fn db(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }
}
