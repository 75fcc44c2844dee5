use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use casa_vistas::config::{AppConfig, PricingConfig};
use casa_vistas::db;
use casa_vistas::handlers;
use casa_vistas::models::{month_range, Booking, PaymentKind};
use casa_vistas::services::email::{EmailMessage, EmailProvider};
use casa_vistas::services::gcal::{CalendarEvent, CalendarProvider, NewEvent};
use casa_vistas::services::guesty::{AvailabilitySource, UpstreamDay};
use casa_vistas::services::payments::stripe::sign_payload;
use casa_vistas::services::payments::{CheckoutRequest, CheckoutSession, PaymentProvider};
use casa_vistas::state::AppState;

const WEBHOOK_SECRET: &str = "whsec_test";
const ADMIN: &str = "Bearer test-token";

// ── Mock Providers ──

#[derive(Default)]
struct MockGuesty {
    blocked: Mutex<Vec<NaiveDate>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl AvailabilitySource for MockGuesty {
    async fn fetch_month(&self, year: i32, month: u32) -> anyhow::Result<Vec<UpstreamDay>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("guesty down");
        }
        let (first, last) = month_range(year, month).unwrap();
        let blocked = self.blocked.lock().unwrap();
        Ok(first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(|date| {
                let taken = blocked.contains(&date);
                UpstreamDay {
                    date,
                    available: !taken,
                    reservation_id: taken.then(|| "guesty-r1".to_string()),
                }
            })
            .collect())
    }
}

#[derive(Default)]
struct MockCalendar {
    existing: Mutex<Vec<CalendarEvent>>,
    inserted: Mutex<Vec<NewEvent>>,
    patched: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    async fn list_events(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn insert_event(&self, event: &NewEvent) -> anyhow::Result<String> {
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(event.clone());
        Ok(format!("evt-{}", inserted.len()))
    }

    async fn patch_summary(&self, event_id: &str, summary: &str) -> anyhow::Result<()> {
        self.patched
            .lock()
            .unwrap()
            .push((event_id.to_string(), summary.to_string()));
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push(event_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct MockPayments {
    sessions: Mutex<Vec<(String, PaymentKind, i64)>>,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> anyhow::Result<CheckoutSession> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.push((request.booking.id.clone(), request.kind, request.amount_cents));
        let id = format!("cs_test_{}", sessions.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/{id}"),
            id,
        })
    }
}

#[derive(Default)]
struct MockEmail {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// Providers are shared with the state through these forwarding wrappers so
// tests can inspect what was recorded.
struct Shared<T>(Arc<T>);

#[async_trait]
impl CalendarProvider for Shared<MockCalendar> {
    async fn list_events(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<CalendarEvent>> {
        self.0.list_events(start, end).await
    }
    async fn insert_event(&self, event: &NewEvent) -> anyhow::Result<String> {
        self.0.insert_event(event).await
    }
    async fn patch_summary(&self, event_id: &str, summary: &str) -> anyhow::Result<()> {
        self.0.patch_summary(event_id, summary).await
    }
    async fn delete_event(&self, event_id: &str) -> anyhow::Result<()> {
        self.0.delete_event(event_id).await
    }
}

#[async_trait]
impl PaymentProvider for Shared<MockPayments> {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> anyhow::Result<CheckoutSession> {
        self.0.create_checkout_session(request).await
    }
}

#[async_trait]
impl EmailProvider for Shared<MockEmail> {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.0.send(message).await
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        site_url: "https://casavistas.test".to_string(),
        guesty_client_id: String::new(),
        guesty_client_secret: String::new(),
        guesty_listing_id: String::new(),
        stripe_secret_key: String::new(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        google_client_id: String::new(),
        google_client_secret: String::new(),
        google_refresh_token: String::new(),
        google_calendar_id: "primary".to_string(),
        resend_api_key: String::new(),
        email_from: "bookings@casavistas.test".to_string(),
        owner_email: "owner@casavistas.test".to_string(),
        pricing: PricingConfig::default(),
    }
}

struct Harness {
    state: Arc<AppState>,
    guesty: Arc<MockGuesty>,
    calendar: Arc<MockCalendar>,
    payments: Arc<MockPayments>,
    email: Arc<MockEmail>,
}

fn harness() -> Harness {
    harness_with(test_config())
}

fn harness_with(config: AppConfig) -> Harness {
    let conn = db::init_db(":memory:").unwrap();
    let guesty = Arc::new(MockGuesty::default());
    let calendar = Arc::new(MockCalendar::default());
    let payments = Arc::new(MockPayments::default());
    let email = Arc::new(MockEmail::default());

    let state = Arc::new(AppState::new(
        Arc::new(Mutex::new(conn)),
        config,
        guesty.clone(),
        Box::new(Shared(calendar.clone())),
        Box::new(Shared(payments.clone())),
        Box::new(Shared(email.clone())),
    ));

    Harness {
        state,
        guesty,
        calendar,
        payments,
        email,
    }
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
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
        .with_state(state)
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_req(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", ADMIN);
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A date in June of next year, always off season and in the future.
fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(Utc::now().year() + 1, 6, day).unwrap()
}

fn december(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(Utc::now().year() + 1, 12, day).unwrap()
}

fn booking_body(check_in: NaiveDate, check_out: NaiveDate) -> Value {
    json!({
        "guest_name": "Ana Pérez",
        "guest_email": "ana@example.com",
        "guest_phone": "+34600000000",
        "guests": 4,
        "check_in": check_in,
        "check_out": check_out,
    })
}

fn stripe_event(booking_id: &str, kind: &str, session_id: &str) -> String {
    json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "payment_intent": format!("pi_{session_id}"),
            "payment_status": "paid",
            "metadata": { "booking_id": booking_id, "payment_type": kind }
        }}
    })
    .to_string()
}

fn webhook_req(payload: &str) -> Request<Body> {
    let signature = sign_payload(WEBHOOK_SECRET, payload.as_bytes(), Utc::now().timestamp());
    Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("Content-Type", "application/json")
        .header("Stripe-Signature", signature)
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn create_booking(h: &Harness, check_in: NaiveDate, check_out: NaiveDate) -> Value {
    let (status, json) = send(
        &h.state,
        json_post("/api/bookings", booking_body(check_in, check_out)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

async fn booking_status(h: &Harness, id: &str) -> String {
    let (status, json) = send(&h.state, get_req(&format!("/api/bookings/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    json["status"].as_str().unwrap().to_string()
}

// ── Public API Tests ──

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, json) = send(&h.state, get_req("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_season_endpoint() {
    let h = harness();

    let (status, json) = send(&h.state, get_req("/api/season?date=2026-04-06")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["season"], "high");
    assert_eq!(json["easter_sunday"], "2026-04-05");
    assert_eq!(json["good_friday"], "2026-04-03");
    assert_eq!(json["high_season"]["start"], "2025-12-20");
    assert_eq!(json["high_season"]["end"], "2026-04-07");

    let (_, json) = send(&h.state, get_req("/api/season?date=2026-07-01")).await;
    assert_eq!(json["season"], "off");
    assert_eq!(json["high_season"]["start"], "2026-12-20");

    let (status, _) = send(&h.state, get_req("/api/season?date=not-a-date")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_season_at_calendar_limits() {
    let h = harness();

    let (status, json) = send(&h.state, get_req("/api/season?date=-262143-01-02")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("out of range"));

    // the server keeps answering afterwards
    let (status, _) = send(&h.state, get_req("/api/season?date=2026-07-01")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_public_calendar_merges_sources_without_guest_names() {
    let h = harness();
    h.guesty.blocked.lock().unwrap().push(june(3));
    h.calendar.existing.lock().unwrap().push(CalendarEvent {
        id: "fam".into(),
        summary: "Family holidays".into(),
        start: june(10),
        end: june(12),
    });

    let year = june(1).year();
    let (status, json) = send(&h.state, get_req(&format!("/api/calendar/{year}/6"))).await;
    assert_eq!(status, StatusCode::OK);

    let days = json["days"].as_array().unwrap();
    assert_eq!(days.len(), 30);
    assert_eq!(days[0]["status"], "available");
    assert_eq!(days[0]["season"], "off");
    assert_eq!(days[2]["status"], "booked");
    assert!(days[2].get("guest").is_none());
    assert_eq!(days[9]["status"], "family");
    assert_eq!(days[11]["status"], "available");
}

#[tokio::test]
async fn test_calendar_is_cached_per_month() {
    let h = harness();
    let year = june(1).year();
    send(&h.state, get_req(&format!("/api/calendar/{year}/6"))).await;
    send(&h.state, get_req(&format!("/api/calendar/{year}/6"))).await;
    assert_eq!(h.guesty.calls.load(Ordering::SeqCst), 1);

    let (status, json) = send(
        &h.state,
        admin_req("POST", "/api/admin/cache/invalidate", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    send(&h.state, get_req(&format!("/api/calendar/{year}/6"))).await;
    assert_eq!(h.guesty.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_calendar_upstream_failure_without_cache() {
    let h = harness();
    h.guesty.failing.store(true, Ordering::SeqCst);
    let year = june(1).year();
    let (status, json) = send(&h.state, get_req(&format!("/api/calendar/{year}/6"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("upstream"));
}

#[tokio::test]
async fn test_calendar_invalid_month() {
    let h = harness();
    let (status, _) = send(&h.state, get_req("/api/calendar/2027/13")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_booking() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;

    let booking = &json["booking"];
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["nights"], 7);
    assert_eq!(booking["nightly_rate"], 18_000);
    assert_eq!(booking["total_price"], 7 * 18_000 + 12_000);
    assert_eq!(
        booking["deposit_required"].as_i64().unwrap() + booking["balance_due"].as_i64().unwrap(),
        booking["total_price"].as_i64().unwrap()
    );
    assert_eq!(booking["deposit_session_id"], "cs_test_1");
    assert_eq!(json["checkout_url"], "https://checkout.stripe.test/cs_test_1");

    let sessions = h.payments.sessions.lock().unwrap().clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].1, PaymentKind::Deposit);
    assert_eq!(sessions[0].2, booking["deposit_required"].as_i64().unwrap());

    let sent = h.email.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
    assert!(sent[0].html.contains("cs_test_1"));
}

#[tokio::test]
async fn test_booking_summary_hides_contact_details() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap();

    let (status, summary) = send(&h.state, get_req(&format!("/api/bookings/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["guest_name"], "Ana Pérez");
    assert!(summary.get("guest_email").is_none());

    let (status, _) = send(&h.state, get_req("/api/bookings/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_booking_validation() {
    let h = harness();

    // below minimum stay
    let (status, _) = send(&h.state, json_post("/api/bookings", booking_body(june(10), june(12)))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // reversed dates
    let (status, _) = send(&h.state, json_post("/api/bookings", booking_body(june(17), june(10)))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // in the past
    let past = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    let (status, _) = send(
        &h.state,
        json_post("/api/bookings", booking_body(past, NaiveDate::from_ymd_opt(2020, 6, 8).unwrap())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // too many guests
    let mut body = booking_body(june(10), june(17));
    body["guests"] = json!(20);
    let (status, _) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // bad email
    let mut body = booking_body(june(10), june(17));
    body["guest_email"] = json!("not-an-email");
    let (status, _) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.payments.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_high_season_booking_needs_code() {
    let h = harness();
    let (status, json) = send(
        &h.state,
        json_post("/api/bookings", booking_body(december(21), december(28))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("seasonal code"));
}

#[tokio::test]
async fn test_booking_conflicts_with_upstream_reservation() {
    let h = harness();
    h.guesty.blocked.lock().unwrap().push(june(12));

    let (status, _) = send(&h.state, json_post("/api/bookings", booking_body(june(10), june(17)))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_booking_conflicts_with_owner_calendar() {
    let h = harness();
    h.calendar.existing.lock().unwrap().push(CalendarEvent {
        id: "own".into(),
        summary: "Owner".into(),
        start: june(16),
        end: june(20),
    });

    let (status, _) = send(&h.state, json_post("/api/bookings", booking_body(june(10), june(17)))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // checking out the day the owner arrives is fine
    create_booking(&h, june(10), june(16)).await;
}

// ── Payment Flow Tests ──

#[tokio::test]
async fn test_full_payment_lifecycle() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    // deposit
    let (status, _) = send(&h.state, webhook_req(&stripe_event(&id, "deposit", "cs_test_1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&h, &id).await, "deposit_paid");
    {
        let inserted = h.calendar.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].start, june(10));
        assert_eq!(inserted[0].end, june(17));
    }
    {
        let sent = h.email.sent.lock().unwrap();
        let confirmation = sent
            .iter()
            .find(|m| m.to == "ana@example.com" && !m.attachments.is_empty())
            .expect("deposit confirmation with .ics");
        assert!(String::from_utf8_lossy(&confirmation.attachments[0].content)
            .contains("BEGIN:VEVENT"));
        assert!(sent.iter().any(|m| m.to == "owner@casavistas.test"));
    }

    // the stay now blocks the calendar, with the guest visible to the admin only
    let year = june(1).year();
    let (_, public) = send(&h.state, get_req(&format!("/api/calendar/{year}/6"))).await;
    assert_eq!(public["days"][9]["status"], "booked");
    assert!(public["days"][9].get("guest").is_none());
    let (status, admin) = send(
        &h.state,
        admin_req("GET", &format!("/api/admin/calendar/{year}/6"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admin["days"][9]["guest"], "Ana Pérez");

    // balance requested
    let (status, json) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/bookings/{id}/request-balance"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["booking"]["status"], "balance_due");
    assert_eq!(json["booking"]["balance_session_id"], "cs_test_2");
    {
        let sessions = h.payments.sessions.lock().unwrap();
        assert_eq!(sessions[1].1, PaymentKind::Balance);
        assert_eq!(sessions[1].2, json["booking"]["balance_due"].as_i64().unwrap());
    }

    // balance paid
    let (status, _) = send(&h.state, webhook_req(&stripe_event(&id, "balance", "cs_test_2"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&h, &id).await, "confirmed");
    assert_eq!(h.calendar.patched.lock().unwrap()[0].0, "evt-1");

    // stay completed
    let (status, json) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/bookings/{id}/complete"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");

    let (_, list) = send(&h.state, admin_req("GET", "/api/admin/bookings?status=completed", None)).await;
    let list: Vec<Booking> = serde_json::from_value(list).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].deposit_payment_id.as_deref(), Some("pi_cs_test_1"));
    assert_eq!(list[0].balance_payment_id.as_deref(), Some("pi_cs_test_2"));
}

#[tokio::test]
async fn test_duplicate_webhook_is_acknowledged_and_ignored() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();
    let payload = stripe_event(&id, "deposit", "cs_test_1");

    let (status, _) = send(&h.state, webhook_req(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&h.state, webhook_req(&payload)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(booking_status(&h, &id).await, "deposit_paid");
    assert_eq!(h.calendar.inserted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_balance_before_deposit_is_ignored() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&h.state, webhook_req(&stripe_event(&id, "balance", "cs_x"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&h, &id).await, "pending");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let h = harness();
    let payload = stripe_event("b-1", "deposit", "cs_1");

    let req = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("Stripe-Signature", "t=1,v1=deadbeef")
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, _) = send(&h.state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(&h.state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_for_unknown_booking_is_acknowledged() {
    let h = harness();
    let (status, json) = send(&h.state, webhook_req(&stripe_event("nope", "deposit", "cs_1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
}

#[tokio::test]
async fn test_other_events_are_acknowledged() {
    let h = harness();
    let payload = json!({
        "id": "evt_x",
        "type": "checkout.session.expired",
        "data": { "object": { "id": "cs_1", "metadata": {} } }
    })
    .to_string();
    let (status, _) = send(&h.state, webhook_req(&payload)).await;
    assert_eq!(status, StatusCode::OK);
}

// ── Admin API Tests ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let h = harness();

    let (status, _) = send(&h.state, get_req("/api/admin/bookings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/admin/bookings")
        .header("Authorization", "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&h.state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_admin_locked_without_configured_token() {
    let mut config = test_config();
    config.admin_token = String::new();
    let h = harness_with(config);

    for auth in ["Bearer ", "Bearer changeme", ""] {
        let req = Request::builder()
            .method("POST")
            .uri("/api/admin/cache/invalidate")
            .header("Authorization", auth)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&h.state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth:?}");
    }
}

#[tokio::test]
async fn test_admin_list_rejects_unknown_status() {
    let h = harness();
    let (status, _) = send(&h.state, admin_req("GET", "/api/admin/bookings?status=bogus", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_booking() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();
    send(&h.state, webhook_req(&stripe_event(&id, "deposit", "cs_test_1"))).await;

    let (status, json) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/bookings/{id}/cancel"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert!(json["calendar_event_id"].is_null());
    assert_eq!(h.calendar.deleted.lock().unwrap().as_slice(), ["evt-1"]);

    // cancelled is terminal
    let (status, _) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/bookings/{id}/cancel"), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // dates are free again
    create_booking(&h, june(10), june(17)).await;
}

#[tokio::test]
async fn test_cannot_complete_unpaid_booking() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap();

    let (status, _) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/bookings/{id}/complete"), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/bookings/{id}/request-balance"), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_booking() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap();

    let (status, _) = send(&h.state, admin_req("DELETE", &format!("/api/admin/bookings/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&h.state, get_req(&format!("/api/bookings/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.state, admin_req("DELETE", &format!("/api/admin/bookings/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ics_download() {
    let h = harness();
    let json = create_booking(&h, june(10), june(17)).await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    let res = test_app(h.state.clone())
        .oneshot(get_req(&format!("/calendar/{id}.ics")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/calendar; charset=utf-8"
    );
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let ics = String::from_utf8(body.to_vec()).unwrap();
    assert!(ics.contains(&format!("DTSTART;VALUE=DATE:{}", june(10).format("%Y%m%d"))));
    assert!(ics.contains(&format!("DTEND;VALUE=DATE:{}", june(17).format("%Y%m%d"))));

    send(&h.state, admin_req("POST", &format!("/api/admin/bookings/{id}/cancel"), None)).await;
    let (status, _) = send(&h.state, get_req(&format!("/calendar/{id}.ics"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Seasonal Code Tests ──

async fn submit_inquiry(h: &Harness) -> String {
    let (status, json) = send(
        &h.state,
        json_post(
            "/api/inquiries",
            json!({
                "guest_name": "Ben Ortiz",
                "guest_email": "ben@example.com",
                "check_in": december(21),
                "check_out": december(28),
                "guests": 6,
                "message": "Christmas with the family"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["status"], "new");
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_inquiry_for_off_season_dates_rejected() {
    let h = harness();
    let (status, _) = send(
        &h.state,
        json_post(
            "/api/inquiries",
            json!({
                "guest_name": "Ben",
                "guest_email": "ben@example.com",
                "check_in": june(10),
                "check_out": june(17),
                "guests": 2
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_seasonal_code_flow() {
    let h = harness();
    let inquiry_id = submit_inquiry(&h).await;
    assert!(h
        .email
        .sent
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.to == "owner@casavistas.test"));

    let (status, list) = send(&h.state, admin_req("GET", "/api/admin/inquiries", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, code) = send(
        &h.state,
        admin_req(
            "POST",
            &format!("/api/admin/inquiries/{inquiry_id}/approve"),
            Some(json!({ "discount_percent": 10 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{code}");
    let code = code["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);
    assert!(h
        .email
        .sent
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.to == "ben@example.com" && m.html.contains(&code)));

    // lowercase input is accepted
    let (status, verified) = send(
        &h.state,
        json_post("/api/seasonal-codes/verify", json!({ "code": code.to_lowercase() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["discount_percent"], 10);
    assert_eq!(verified["check_in"], json!(december(21)));

    // the code only unlocks its own dates
    let mut body = booking_body(december(22), december(29));
    body["seasonal_code"] = json!(code);
    let (status, _) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = booking_body(december(21), december(28));
    body["seasonal_code"] = json!(code);
    let (status, json) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let booking = &json["booking"];
    assert_eq!(booking["nightly_rate"], 32_000);
    assert_eq!(booking["discount_percent"], 10);
    assert_eq!(booking["subtotal"], 7 * 32_000);
    assert_eq!(booking["total_price"], 7 * 32_000 - 7 * 32_000 / 10 + 12_000);
    assert_eq!(
        booking["deposit_required"].as_i64().unwrap() + booking["balance_due"].as_i64().unwrap(),
        booking["total_price"].as_i64().unwrap()
    );
    assert_eq!(booking["seasonal_code"], json!(code));

    // used codes are rejected afterwards
    let (status, _) = send(
        &h.state,
        json_post("/api/seasonal-codes/verify", json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut body = booking_body(december(21), december(28));
    body["seasonal_code"] = json!(code);
    let (status, _) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

async fn approve(h: &Harness, inquiry_id: &str, discount_percent: i64) -> String {
    let (status, json) = send(
        &h.state,
        admin_req(
            "POST",
            &format!("/api/admin/inquiries/{inquiry_id}/approve"),
            Some(json!({ "discount_percent": discount_percent })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["code"].as_str().unwrap().to_string()
}

async fn verify_status(h: &Harness, code: &str) -> StatusCode {
    let (status, _) = send(
        &h.state,
        json_post("/api/seasonal-codes/verify", json!({ "code": code })),
    )
    .await;
    status
}

#[tokio::test]
async fn test_declining_withdraws_issued_code() {
    let h = harness();
    let inquiry_id = submit_inquiry(&h).await;
    let code = approve(&h, &inquiry_id, 10).await;
    assert_eq!(verify_status(&h, &code).await, StatusCode::OK);

    let (status, _) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/inquiries/{inquiry_id}/decline"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(verify_status(&h, &code).await, StatusCode::CONFLICT);

    let mut body = booking_body(december(21), december(28));
    body["seasonal_code"] = json!(code);
    let (status, _) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(h.payments.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reapproval_replaces_earlier_code() {
    let h = harness();
    let inquiry_id = submit_inquiry(&h).await;
    let first = approve(&h, &inquiry_id, 10).await;
    let second = approve(&h, &inquiry_id, 50).await;
    assert_ne!(first, second);

    assert_eq!(verify_status(&h, &first).await, StatusCode::CONFLICT);

    let (status, verified) = send(
        &h.state,
        json_post("/api/seasonal-codes/verify", json!({ "code": second })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["discount_percent"], 50);

    let mut body = booking_body(december(21), december(28));
    body["seasonal_code"] = json!(first);
    let (status, _) = send(&h.state, json_post("/api/bookings", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_code() {
    let h = harness();
    let (status, _) = send(
        &h.state,
        json_post("/api/seasonal-codes/verify", json!({ "code": "ZZZZ9999" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_approve_validation_and_decline() {
    let h = harness();
    let inquiry_id = submit_inquiry(&h).await;

    let (status, _) = send(
        &h.state,
        admin_req(
            "POST",
            &format!("/api/admin/inquiries/{inquiry_id}/approve"),
            Some(json!({ "discount_percent": 80 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/inquiries/{inquiry_id}/decline"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h.state,
        admin_req("POST", &format!("/api/admin/inquiries/{inquiry_id}/approve"), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &h.state,
        admin_req("POST", "/api/admin/inquiries/missing/approve", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
