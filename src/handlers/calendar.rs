use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::BookingStatus;
use crate::services::booking::PROPERTY_NAME;
use crate::services::ics::generate_ics;
use crate::state::AppState;

// GET /calendar/:booking_id.ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    // Strip .ics suffix if present
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let booking = {
        let conn = state.db()?;
        queries::get_booking_by_id(&conn, booking_id)?
    };
    let booking = booking
        .filter(|b| b.status != BookingStatus::Cancelled)
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    let ics = generate_ics(&booking, PROPERTY_NAME);
    let filename = format!("casa-vistas-{booking_id}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
