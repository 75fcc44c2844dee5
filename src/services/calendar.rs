//! Month calendar merged from the property-management calendar, the owner's
//! Google Calendar and direct bookings.

use chrono::{Duration, NaiveDate};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{month_range, months_between, Booking, CalendarDay, DayStatus};
use crate::services::gcal::CalendarEvent;
use crate::services::guesty::UpstreamDay;
use crate::services::season;
use crate::state::AppState;

/// Owner calendar entries are family or owner stays when their title says
/// so; anything else on that calendar blocks the house as booked.
pub fn classify_event(summary: &str) -> DayStatus {
    let lower = summary.to_lowercase();
    if lower.contains("famil") {
        DayStatus::Family
    } else if lower.contains("owner") {
        DayStatus::Owner
    } else {
        DayStatus::Booked
    }
}

/// One day per date in `[start, end)`, every source folded in.
pub fn merge_days(
    start: NaiveDate,
    end: NaiveDate,
    upstream: &[UpstreamDay],
    events: &[CalendarEvent],
    bookings: &[Booking],
) -> Vec<CalendarDay> {
    let mut days: Vec<CalendarDay> = start
        .iter_days()
        .take_while(|d| *d < end)
        .map(|date| {
            let mut day = CalendarDay::available(date);
            day.season = Some(season::season(date));
            day
        })
        .collect();

    let index = |date: NaiveDate| -> Option<usize> {
        if date < start || date >= end {
            return None;
        }
        usize::try_from((date - start).num_days()).ok()
    };

    for u in upstream.iter().filter(|u| !u.available) {
        if let Some(i) = index(u.date) {
            days[i].mark(DayStatus::Booked, u.reservation_id.as_deref());
        }
    }

    for event in events {
        let status = classify_event(&event.summary);
        for date in event.start.iter_days().take_while(|d| *d < event.end) {
            if let Some(i) = index(date) {
                days[i].mark(status, Some(&event.summary));
            }
        }
    }

    for booking in bookings.iter().filter(|b| b.status.holds_dates()) {
        for date in booking.check_in.iter_days().take_while(|d| *d < booking.check_out) {
            if let Some(i) = index(date) {
                days[i].mark(DayStatus::Booked, Some(&booking.guest_name));
            }
        }
    }

    days
}

async fn upstream_days(
    state: &AppState,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<UpstreamDay>, AppError> {
    let mut days = vec![];
    for (year, month) in months_between(start, end) {
        let month = state.availability.get_month(year, month).await?;
        days.extend(month.days);
    }
    Ok(days)
}

fn holding_bookings(
    state: &AppState,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Booking>, AppError> {
    let conn = state.db()?;
    let bookings = queries::get_bookings_overlapping(&conn, start, end)?;
    Ok(bookings
        .into_iter()
        .filter(|b| b.status.holds_dates())
        .collect())
}

/// The merged calendar for a month. Guest annotations are only kept for
/// the admin view.
pub async fn month_calendar(
    state: &AppState,
    year: i32,
    month: u32,
    include_guests: bool,
) -> Result<Vec<CalendarDay>, AppError> {
    let (first, last) = month_range(year, month)
        .ok_or_else(|| AppError::Validation(format!("invalid month {year}-{month}")))?;
    let end = last + Duration::days(1);

    let upstream = upstream_days(state, first, end).await?;

    // the public calendar stays up when the owner's calendar is unreachable
    let events = match state.calendar.list_events(first, end).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(year, month, error = %e, "owner calendar unavailable, merging without it");
            vec![]
        }
    };

    let bookings = holding_bookings(state, first, end)?;

    let mut days = merge_days(first, end, &upstream, &events, &bookings);
    if !include_guests {
        for day in &mut days {
            day.guest = None;
        }
    }
    Ok(days)
}

/// Whether every night of `[check_in, check_out)` is free on all sources.
/// Unlike the display calendar, an unreachable source is an error here.
pub async fn range_is_available(
    state: &AppState,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<bool, AppError> {
    if check_out <= check_in {
        return Ok(false);
    }

    let upstream = upstream_days(state, check_in, check_out).await?;
    let events = state
        .calendar
        .list_events(check_in, check_out)
        .await
        .map_err(|e| AppError::Upstream(format!("owner calendar unavailable: {e}")))?;
    let bookings = holding_bookings(state, check_in, check_out)?;

    let days = merge_days(check_in, check_out, &upstream, &events, &bookings);
    Ok(days.iter().all(|d| d.status == DayStatus::Available))
}
