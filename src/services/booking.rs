//! Direct bookings: creation, payments and the admin lifecycle actions.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingEvent, BookingStatus, PaymentKind};
use crate::services::email::{self, templates};
use crate::services::gcal::NewEvent;
use crate::services::payments::{CheckoutRequest, CheckoutSession};
use crate::services::{calendar, ics, pricing, season, seasonal};
use crate::state::AppState;

pub const PROPERTY_NAME: &str = "Casa Vistas";

#[derive(Debug, Deserialize)]
pub struct NewBooking {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub guests: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub seasonal_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub checkout_url: String,
}

/// A completed Checkout session as reported by the payment webhook.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub booking_id: String,
    pub kind: PaymentKind,
    pub session_id: String,
    pub payment_intent: Option<String>,
}

pub(crate) fn validate_contact(name: &str, email: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("guest name is required".to_string()));
    }
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    };
    if !valid {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    Ok(())
}

fn validate_stay(state: &AppState, req: &NewBooking, today: NaiveDate) -> Result<(), AppError> {
    validate_contact(&req.guest_name, &req.guest_email)?;
    let limits = &state.config.pricing;

    if req.guests < 1 || req.guests > limits.max_guests {
        return Err(AppError::Validation(format!(
            "guests must be between 1 and {}",
            limits.max_guests
        )));
    }
    if req.check_out <= req.check_in {
        return Err(AppError::Validation(
            "check-out must be after check-in".to_string(),
        ));
    }
    if req.check_in < today {
        return Err(AppError::Validation("check-in is in the past".to_string()));
    }
    let nights = (req.check_out - req.check_in).num_days();
    if nights < limits.min_nights {
        return Err(AppError::Validation(format!(
            "minimum stay is {} nights",
            limits.min_nights
        )));
    }
    Ok(())
}

fn checkout_urls(state: &AppState, booking_id: &str) -> (String, String) {
    let base = state.config.site_url.trim_end_matches('/');
    (
        format!("{base}/booking/{booking_id}?payment=success&session_id={{CHECKOUT_SESSION_ID}}"),
        format!("{base}/booking/{booking_id}?payment=cancelled"),
    )
}

async fn open_checkout(
    state: &AppState,
    booking: &Booking,
    kind: PaymentKind,
) -> Result<CheckoutSession, AppError> {
    let (success_url, cancel_url) = checkout_urls(state, &booking.id);
    let amount_cents = match kind {
        PaymentKind::Deposit => booking.deposit_required,
        PaymentKind::Balance => booking.balance_due,
    };
    state
        .payments
        .create_checkout_session(CheckoutRequest {
            booking,
            kind,
            amount_cents,
            success_url,
            cancel_url,
        })
        .await
        .map_err(|e| {
            tracing::error!(booking_id = %booking.id, error = %e, "checkout session failed");
            AppError::Upstream(format!("payment provider unavailable: {e}"))
        })
}

fn load(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let conn = state.db()?;
    queries::get_booking_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))
}

/// Moves a booking along its lifecycle. Fails with a conflict when the
/// event does not apply or another request changed the status first.
fn transition(state: &AppState, booking: &Booking, event: BookingEvent) -> Result<BookingStatus, AppError> {
    let next = booking.status.apply(event)?;
    let conn = state.db()?;
    if !queries::transition_booking_status(&conn, &booking.id, booking.status, next)? {
        return Err(AppError::Conflict(
            "booking status changed concurrently".to_string(),
        ));
    }
    tracing::info!(booking_id = %booking.id, from = %booking.status, to = %next, "booking status changed");
    Ok(next)
}

pub async fn create_booking(
    state: &AppState,
    req: NewBooking,
    today: NaiveDate,
) -> Result<CreatedBooking, AppError> {
    validate_stay(state, &req, today)?;
    let now = Utc::now().naive_utc();

    let code = match req.seasonal_code.as_deref().map(seasonal::normalize_code) {
        Some(code) if !code.is_empty() => {
            let conn = state.db()?;
            let (found, inquiry) = seasonal::check_code(&conn, &code, now)?;
            if inquiry.check_in != req.check_in || inquiry.check_out != req.check_out {
                return Err(AppError::Validation(
                    "dates do not match the seasonal code".to_string(),
                ));
            }
            Some(found)
        }
        _ => None,
    };

    if code.is_none() {
        let (high, _) = season::nights_by_season(req.check_in, req.check_out);
        if high > 0 {
            return Err(AppError::Validation(
                "high-season dates need a seasonal code; send an inquiry first".to_string(),
            ));
        }
    }

    if !calendar::range_is_available(state, req.check_in, req.check_out).await? {
        return Err(AppError::Conflict("dates are not available".to_string()));
    }

    let discount = code.as_ref().map(|c| c.discount_percent).unwrap_or(0);
    let quote = pricing::quote(&state.config.pricing, req.check_in, req.check_out, discount);

    let mut booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        guest_name: req.guest_name.trim().to_string(),
        guest_email: req.guest_email.trim().to_string(),
        guest_phone: req.guest_phone.filter(|p| !p.trim().is_empty()),
        guests: req.guests,
        check_in: req.check_in,
        check_out: req.check_out,
        nights: quote.nights,
        nightly_rate: quote.nightly_rate,
        subtotal: quote.subtotal,
        discount_percent: quote.discount_percent,
        cleaning_fee: quote.cleaning_fee,
        total_price: quote.total,
        deposit_required: quote.deposit,
        balance_due: quote.balance,
        status: BookingStatus::Pending,
        seasonal_code: code.as_ref().map(|c| c.code.clone()),
        deposit_session_id: None,
        deposit_payment_id: None,
        balance_session_id: None,
        balance_payment_id: None,
        calendar_event_id: None,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    // An unused session simply expires, so open it before anything is
    // written or the code is spent.
    let session = open_checkout(state, &booking, PaymentKind::Deposit).await?;
    booking.deposit_session_id = Some(session.id.clone());

    {
        let conn = state.db()?;
        let tx = conn.unchecked_transaction()?;
        if let Some(code) = &booking.seasonal_code {
            seasonal::redeem_code(&tx, code, now)?;
        }
        queries::create_booking(&tx, &booking)?;
        tx.commit()?;
    }

    tracing::info!(
        booking_id = %booking.id,
        check_in = %booking.check_in,
        check_out = %booking.check_out,
        total = booking.total_price,
        "booking created"
    );

    let msg = templates::booking_received(&booking, &session.url);
    email::deliver(state.email.as_ref(), &msg).await;

    Ok(CreatedBooking {
        booking,
        checkout_url: session.url,
    })
}

/// Opens a balance Checkout session and sends the guest the link. Calling it
/// again while the balance is due re-issues the link.
pub async fn request_balance(state: &AppState, id: &str) -> Result<CreatedBooking, AppError> {
    let booking = load(state, id)?;
    if booking.status != BookingStatus::BalanceDue {
        booking.status.apply(BookingEvent::BalanceRequested)?;
    }

    let session = open_checkout(state, &booking, PaymentKind::Balance).await?;
    {
        let conn = state.db()?;
        queries::set_checkout_session(&conn, &booking.id, PaymentKind::Balance, &session.id)?;
    }
    if booking.status != BookingStatus::BalanceDue {
        transition(state, &booking, BookingEvent::BalanceRequested)?;
    }

    let booking = load(state, id)?;
    let msg = templates::balance_request(&booking, &session.url);
    email::deliver(state.email.as_ref(), &msg).await;

    Ok(CreatedBooking {
        booking,
        checkout_url: session.url,
    })
}

/// Records a completed payment and runs its side effects.
pub async fn apply_payment(
    state: &AppState,
    payment: PaymentConfirmation,
) -> Result<Booking, AppError> {
    let booking = load(state, &payment.booking_id)?;
    let event = match payment.kind {
        PaymentKind::Deposit => BookingEvent::DepositPaid,
        PaymentKind::Balance => BookingEvent::BalancePaid,
    };

    let expected_session = match payment.kind {
        PaymentKind::Deposit => booking.deposit_session_id.as_deref(),
        PaymentKind::Balance => booking.balance_session_id.as_deref(),
    };
    if expected_session.is_some_and(|s| s != payment.session_id) {
        tracing::warn!(
            booking_id = %booking.id,
            session_id = %payment.session_id,
            "payment from a superseded checkout session"
        );
    }

    transition(state, &booking, event)?;
    {
        let reference = payment
            .payment_intent
            .as_deref()
            .unwrap_or(&payment.session_id);
        let conn = state.db()?;
        queries::set_payment_reference(&conn, &booking.id, payment.kind, reference)?;
    }

    let booking = load(state, &payment.booking_id)?;
    match payment.kind {
        PaymentKind::Deposit => on_deposit_paid(state, &booking).await?,
        PaymentKind::Balance => on_balance_paid(state, &booking).await,
    }
    load(state, &payment.booking_id)
}

fn event_summary(booking: &Booking) -> String {
    let label = match booking.status {
        BookingStatus::Confirmed | BookingStatus::Completed => "paid",
        _ => "deposit paid",
    };
    format!("{PROPERTY_NAME}: {} ({label})", booking.guest_name)
}

async fn on_deposit_paid(state: &AppState, booking: &Booking) -> Result<(), AppError> {
    let overlapping = {
        let conn = state.db()?;
        queries::get_bookings_overlapping(&conn, booking.check_in, booking.check_out)?
    };
    for other in overlapping
        .iter()
        .filter(|o| o.id != booking.id && o.status.holds_dates())
    {
        tracing::error!(
            booking_id = %booking.id,
            other_booking_id = %other.id,
            "deposit paid for dates already held by another booking"
        );
    }

    let hold = NewEvent {
        summary: event_summary(booking),
        description: format!(
            "Booking {}\n{} guests\n{}\n{}",
            booking.id,
            booking.guests,
            booking.guest_email,
            booking.guest_phone.as_deref().unwrap_or("")
        ),
        start: booking.check_in,
        end: booking.check_out,
    };
    match state.calendar.insert_event(&hold).await {
        Ok(event_id) => {
            let conn = state.db()?;
            queries::set_calendar_event(&conn, &booking.id, Some(&event_id))?;
        }
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, error = %e, "failed to create calendar hold");
        }
    }

    let ics = ics::generate_ics(booking, PROPERTY_NAME);
    let msg = templates::deposit_confirmed(booking, &ics);
    email::deliver(state.email.as_ref(), &msg).await;

    if !state.config.owner_email.is_empty() {
        let msg = templates::owner_deposit_paid(&state.config.owner_email, booking);
        email::deliver(state.email.as_ref(), &msg).await;
    }
    Ok(())
}

async fn on_balance_paid(state: &AppState, booking: &Booking) {
    if let Some(event_id) = &booking.calendar_event_id {
        if let Err(e) = state
            .calendar
            .patch_summary(event_id, &event_summary(booking))
            .await
        {
            tracing::warn!(booking_id = %booking.id, error = %e, "failed to update calendar hold");
        }
    }

    let msg = templates::balance_confirmed(booking);
    email::deliver(state.email.as_ref(), &msg).await;
}

async fn release_calendar_hold(state: &AppState, booking: &Booking) -> Result<(), AppError> {
    let Some(event_id) = &booking.calendar_event_id else {
        return Ok(());
    };
    if let Err(e) = state.calendar.delete_event(event_id).await {
        tracing::warn!(booking_id = %booking.id, error = %e, "failed to delete calendar hold");
        return Ok(());
    }
    let conn = state.db()?;
    queries::set_calendar_event(&conn, &booking.id, None)?;
    Ok(())
}

pub async fn cancel(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let booking = load(state, id)?;
    transition(state, &booking, BookingEvent::Cancel)?;
    release_calendar_hold(state, &booking).await?;
    load(state, id)
}

pub fn complete(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let booking = load(state, id)?;
    transition(state, &booking, BookingEvent::StayCompleted)?;
    load(state, id)
}

pub async fn delete(state: &AppState, id: &str) -> Result<(), AppError> {
    let booking = load(state, id)?;
    release_calendar_hold(state, &booking).await?;
    let conn = state.db()?;
    if !queries::delete_booking(&conn, id)? {
        return Err(AppError::NotFound("booking not found".to_string()));
    }
    tracing::info!(booking_id = %id, "booking deleted");
    Ok(())
}
