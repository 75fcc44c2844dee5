use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::MonthResponse;
use crate::models::{Booking, BookingStatus, SeasonalCode, SeasonalInquiry};
use crate::services::booking::{self, CreatedBooking};
use crate::services::{calendar, seasonal};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status_filter = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let bookings = {
        let conn = state.db()?;
        queries::get_all_bookings(&conn, status_filter.map(|s| s.as_str()), limit)?
    };
    Ok(Json(bookings))
}

// POST /api/admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(booking::cancel(&state, &id).await?))
}

// POST /api/admin/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(booking::complete(&state, &id)?))
}

// POST /api/admin/bookings/:id/request-balance
pub async fn request_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CreatedBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(booking::request_balance(&state, &id).await?))
}

// DELETE /api/admin/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    booking::delete(&state, &id).await?;
    Ok(Json(json!({ "ok": true })))
}

// GET /api/admin/calendar/:year/:month
pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let days = calendar::month_calendar(&state, year, month, true).await?;
    Ok(Json(MonthResponse { year, month, days }))
}

// GET /api/admin/inquiries
#[derive(Deserialize)]
pub struct InquiriesQuery {
    pub limit: Option<i64>,
}

pub async fn get_inquiries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<InquiriesQuery>,
) -> Result<Json<Vec<SeasonalInquiry>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let inquiries = {
        let conn = state.db()?;
        queries::list_inquiries(&conn, limit)?
    };
    Ok(Json(inquiries))
}

// POST /api/admin/inquiries/:id/approve
#[derive(Deserialize, Default)]
pub struct ApproveRequest {
    #[serde(default)]
    pub discount_percent: i64,
}

pub async fn approve_inquiry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<SeasonalCode>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(req) = body.unwrap_or_default();
    Ok(Json(
        seasonal::approve_inquiry(&state, &id, req.discount_percent).await?,
    ))
}

// POST /api/admin/inquiries/:id/decline
pub async fn decline_inquiry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    seasonal::decline_inquiry(&state, &id).await?;
    Ok(Json(json!({ "ok": true })))
}

// POST /api/admin/cache/invalidate
#[derive(Deserialize, Default)]
pub struct InvalidateRequest {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<InvalidateRequest>>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(req) = body.unwrap_or_default();

    let removed = match (req.year, req.month) {
        (Some(year), Some(month)) => usize::from(state.availability.invalidate(year, month)?),
        (None, None) => state.availability.invalidate_all()?,
        _ => {
            return Err(AppError::Validation(
                "give both year and month, or neither".to_string(),
            ))
        }
    };
    tracing::info!(removed, "availability cache invalidated");
    Ok(Json(json!({ "removed": removed })))
}
