use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, CalendarDay};
use crate::services::booking::{self, CreatedBooking, NewBooking};
use crate::services::calendar;
use crate::state::AppState;

#[derive(Serialize)]
pub struct MonthResponse {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

// GET /api/calendar/:year/:month
pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthResponse>, AppError> {
    let days = calendar::month_calendar(&state, year, month, false).await?;
    Ok(Json(MonthResponse { year, month, days }))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<CreatedBooking>), AppError> {
    let created = booking::create_booking(&state, req, Utc::now().date_naive()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// What a guest may see about their own booking.
#[derive(Serialize)]
pub struct BookingSummary {
    pub id: String,
    pub guest_name: String,
    pub status: BookingStatus,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub guests: i64,
    pub nightly_rate: i64,
    pub discount_percent: i64,
    pub cleaning_fee: i64,
    pub total_price: i64,
    pub deposit_required: i64,
    pub balance_due: i64,
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingSummary>, AppError> {
    let b = {
        let conn = state.db()?;
        queries::get_booking_by_id(&conn, &id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok(Json(BookingSummary {
        id: b.id,
        guest_name: b.guest_name,
        status: b.status,
        check_in: b.check_in,
        check_out: b.check_out,
        nights: b.nights,
        guests: b.guests,
        nightly_rate: b.nightly_rate,
        discount_percent: b.discount_percent,
        cleaning_fee: b.cleaning_fee,
        total_price: b.total_price,
        deposit_required: b.deposit_required,
        balance_due: b.balance_due,
    }))
}
