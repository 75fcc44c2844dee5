use axum::extract::Query;
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Season;
use crate::services::season;

#[derive(Deserialize)]
pub struct SeasonQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct SeasonWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Serialize)]
pub struct SeasonResponse {
    pub date: NaiveDate,
    pub season: Season,
    pub easter_sunday: NaiveDate,
    pub good_friday: NaiveDate,
    pub easter_monday: NaiveDate,
    /// The high-season window the date falls in, or the next one.
    pub high_season: SeasonWindow,
}

// GET /api/season?date=YYYY-MM-DD
pub async fn get_season(
    Query(query): Query<SeasonQuery>,
) -> Result<Json<SeasonResponse>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let year = date.year();
    let out_of_range = || AppError::Validation(format!("date {date} is out of range"));

    let this_end = season::high_season_end(year).ok_or_else(out_of_range)?;
    let window_year = if date <= this_end { year - 1 } else { year };
    let (start, end) = season::high_season_window(window_year).ok_or_else(out_of_range)?;

    Ok(Json(SeasonResponse {
        date,
        season: season::season(date),
        easter_sunday: season::easter_sunday(year).ok_or_else(out_of_range)?,
        good_friday: season::good_friday(year).ok_or_else(out_of_range)?,
        easter_monday: season::easter_monday(year).ok_or_else(out_of_range)?,
        high_season: SeasonWindow { start, end },
    }))
}
