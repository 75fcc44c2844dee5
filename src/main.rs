use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use casa_vistas::config::AppConfig;
use casa_vistas::db::{self, KvStore};
use casa_vistas::handlers;
use casa_vistas::services::email::resend::ResendClient;
use casa_vistas::services::gcal::google::GoogleCalendarClient;
use casa_vistas::services::guesty::client::GuestyClient;
use casa_vistas::services::payments::stripe::StripeClient;
use casa_vistas::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));
    let kv = KvStore::new(db.clone());

    if config.guesty_client_id.is_empty() {
        tracing::warn!("GUESTY_CLIENT_ID not set, calendar requests will fail");
    }
    if config.admin_token.is_empty() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes will reject every request");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook signatures are not checked");
    }

    let guesty = GuestyClient::new(
        config.guesty_client_id.clone(),
        config.guesty_client_secret.clone(),
        config.guesty_listing_id.clone(),
        Some(kv.clone()),
    );
    let google = GoogleCalendarClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_refresh_token.clone(),
        config.google_calendar_id.clone(),
        Some(kv.clone()),
    );
    if !google.is_configured() {
        tracing::warn!("Google Calendar not configured, bookings will fail availability checks");
    }
    let stripe = StripeClient::new(config.stripe_secret_key.clone());
    let resend = ResendClient::new(config.resend_api_key.clone(), config.email_from.clone());

    let state = Arc::new(AppState::new(
        db,
        config.clone(),
        Arc::new(guesty),
        Box::new(google),
        Box::new(stripe),
        Box::new(resend),
    ));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/season", get(handlers::season::get_season))
        .route(
            "/api/calendar/:year/:month",
            get(handlers::bookings::get_calendar),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route("/api/inquiries", post(handlers::inquiries::create_inquiry))
        .route(
            "/api/seasonal-codes/verify",
            post(handlers::inquiries::verify_code),
        )
        .route("/webhook/stripe", post(handlers::webhook::stripe_webhook))
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/:id",
            delete(handlers::admin::delete_booking),
        )
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route(
            "/api/admin/bookings/:id/complete",
            post(handlers::admin::complete_booking),
        )
        .route(
            "/api/admin/bookings/:id/request-balance",
            post(handlers::admin::request_balance),
        )
        .route(
            "/api/admin/calendar/:year/:month",
            get(handlers::admin::get_calendar),
        )
        .route("/api/admin/inquiries", get(handlers::admin::get_inquiries))
        .route(
            "/api/admin/inquiries/:id/approve",
            post(handlers::admin::approve_inquiry),
        )
        .route(
            "/api/admin/inquiries/:id/decline",
            post(handlers::admin::decline_inquiry),
        )
        .route(
            "/api/admin/cache/invalidate",
            post(handlers::admin::invalidate_cache),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
