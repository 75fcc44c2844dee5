use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub site_url: String,
    pub guesty_client_id: String,
    pub guesty_client_secret: String,
    pub guesty_listing_id: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_refresh_token: String,
    pub google_calendar_id: String,
    pub resend_api_key: String,
    pub email_from: String,
    pub owner_email: String,
    pub pricing: PricingConfig,
}

/// Rates and stay limits. Amounts are EUR cents.
#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub off_season_rate: i64,
    pub high_season_rate: i64,
    pub cleaning_fee: i64,
    pub min_nights: i64,
    pub max_guests: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            off_season_rate: 18_000,
            high_season_rate: 32_000,
            cleaning_fee: 12_000,
            min_nights: 3,
            max_guests: 8,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = PricingConfig::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "casa_vistas.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_default(),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            guesty_client_id: env::var("GUESTY_CLIENT_ID").unwrap_or_default(),
            guesty_client_secret: env::var("GUESTY_CLIENT_SECRET").unwrap_or_default(),
            guesty_listing_id: env::var("GUESTY_LISTING_ID").unwrap_or_default(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_refresh_token: env::var("GOOGLE_REFRESH_TOKEN").unwrap_or_default(),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Casa Vistas <bookings@casavistas.example>".to_string()),
            owner_email: env::var("OWNER_EMAIL").unwrap_or_default(),
            pricing: PricingConfig {
                off_season_rate: env_i64("OFF_SEASON_RATE_CENTS", defaults.off_season_rate),
                high_season_rate: env_i64("HIGH_SEASON_RATE_CENTS", defaults.high_season_rate),
                cleaning_fee: env_i64("CLEANING_FEE_CENTS", defaults.cleaning_fee),
                min_nights: env_i64("MIN_NIGHTS", defaults.min_nights),
                max_guests: env_i64("MAX_GUESTS", defaults.max_guests),
            },
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
