//! High / off season classification.
//!
//! High season runs from December 20 through the day after Easter Monday of
//! the following year. Easter moves, so the end of the window is computed
//! per year and memoized.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::Season;

static EASTER_CACHE: OnceLock<Mutex<HashMap<i32, NaiveDate>>> = OnceLock::new();

/// Easter Sunday for a Gregorian year (anonymous Gregorian algorithm,
/// Meeus/Jones/Butcher). `None` only outside chrono's supported years.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let cache = EASTER_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(cache) = cache.lock() {
        if let Some(date) = cache.get(&year) {
            return Some(*date);
        }
    }

    let date = compute_easter(year)?;
    if let Ok(mut cache) = cache.lock() {
        cache.insert(year, date);
    }
    Some(date)
}

fn compute_easter(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

pub fn good_friday(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_sub_signed(Duration::days(2))
}

pub fn easter_monday(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_add_signed(Duration::days(1))
}

/// Last high-season day of the window that ends in `year`.
pub fn high_season_end(year: i32) -> Option<NaiveDate> {
    easter_monday(year)?.checked_add_signed(Duration::days(1))
}

pub fn season(date: NaiveDate) -> Season {
    if date.month() == 12 && date.day() >= 20 {
        return Season::High;
    }
    match high_season_end(date.year()) {
        Some(end) if date <= end => Season::High,
        _ => Season::Off,
    }
}

/// The high-season window opening on December 20 of `year`.
pub fn high_season_window(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 12, 20)?;
    let end = high_season_end(year.checked_add(1)?)?;
    Some((start, end))
}

/// Number of (high, off) nights in a stay. `check_out` is exclusive.
pub fn nights_by_season(check_in: NaiveDate, check_out: NaiveDate) -> (i64, i64) {
    check_in
        .iter_days()
        .take_while(|d| *d < check_out)
        .fold((0, 0), |(high, off), night| match season(night) {
            Season::High => (high + 1, off),
            Season::Off => (high, off + 1),
        })
}
