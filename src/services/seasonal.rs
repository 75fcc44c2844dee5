//! High-season inquiries and the one-time codes that unlock booking them.

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{InquiryStatus, SeasonalCode, SeasonalInquiry};
use crate::services::booking::validate_contact;
use crate::services::email::{self, templates};
use crate::services::season;
use crate::state::AppState;

pub const CODE_LENGTH: usize = 8;
pub const CODE_VALID_DAYS: i64 = 7;
pub const MAX_DISCOUNT_PERCENT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("seasonal code not found")]
    NotFound,
    #[error("seasonal code has already been used")]
    Used,
    #[error("seasonal code has expired")]
    Expired,
    #[error("seasonal code has been withdrawn")]
    Revoked,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
pub struct NewInquiry {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CodeVerification {
    pub code: String,
    pub discount_percent: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    pub expires_at: NaiveDateTime,
}

pub fn generate_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(CODE_LENGTH)
        .collect()
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Looks a code up and checks it can still be used, without using it.
pub fn check_code(
    conn: &Connection,
    code: &str,
    now: NaiveDateTime,
) -> Result<(SeasonalCode, SeasonalInquiry), CodeError> {
    let found = queries::get_code(conn, code)?.ok_or(CodeError::NotFound)?;
    if found.used_at.is_some() {
        return Err(CodeError::Used);
    }
    if found.expires_at <= now {
        return Err(CodeError::Expired);
    }
    let inquiry = queries::get_inquiry(conn, &found.inquiry_id)?.ok_or(CodeError::NotFound)?;
    if inquiry.status != InquiryStatus::Approved {
        return Err(CodeError::Revoked);
    }
    Ok((found, inquiry))
}

/// Uses a code up. Of two concurrent redemptions only one succeeds.
pub fn redeem_code(
    conn: &Connection,
    code: &str,
    now: NaiveDateTime,
) -> Result<SeasonalCode, CodeError> {
    let (found, _) = check_code(conn, code, now)?;
    if !queries::mark_code_used(conn, code)? {
        return Err(CodeError::Used);
    }
    Ok(found)
}

pub async fn create_inquiry(
    state: &AppState,
    req: NewInquiry,
) -> Result<SeasonalInquiry, AppError> {
    validate_contact(&req.guest_name, &req.guest_email)?;
    if req.check_out <= req.check_in {
        return Err(AppError::Validation(
            "check-out must be after check-in".to_string(),
        ));
    }
    if req.guests < 1 || req.guests > state.config.pricing.max_guests {
        return Err(AppError::Validation(format!(
            "guests must be between 1 and {}",
            state.config.pricing.max_guests
        )));
    }
    let (high, _) = season::nights_by_season(req.check_in, req.check_out);
    if high == 0 {
        return Err(AppError::Validation(
            "these dates are off season and can be booked directly".to_string(),
        ));
    }

    let inquiry = SeasonalInquiry {
        id: uuid::Uuid::new_v4().to_string(),
        guest_name: req.guest_name.trim().to_string(),
        guest_email: req.guest_email.trim().to_string(),
        guest_phone: req.guest_phone.filter(|p| !p.trim().is_empty()),
        check_in: req.check_in,
        check_out: req.check_out,
        guests: req.guests,
        message: req.message.filter(|m| !m.trim().is_empty()),
        status: InquiryStatus::New,
        created_at: Utc::now().naive_utc(),
    };
    {
        let conn = state.db()?;
        queries::create_inquiry(&conn, &inquiry)?;
    }
    tracing::info!(inquiry_id = %inquiry.id, "seasonal inquiry received");

    if !state.config.owner_email.is_empty() {
        let msg = templates::owner_inquiry(&state.config.owner_email, &inquiry);
        email::deliver(state.email.as_ref(), &msg).await;
    }
    Ok(inquiry)
}

pub async fn approve_inquiry(
    state: &AppState,
    inquiry_id: &str,
    discount_percent: i64,
) -> Result<SeasonalCode, AppError> {
    if !(0..=MAX_DISCOUNT_PERCENT).contains(&discount_percent) {
        return Err(AppError::Validation(format!(
            "discount must be between 0 and {MAX_DISCOUNT_PERCENT}"
        )));
    }

    let now = Utc::now().naive_utc();
    let (inquiry, code) = {
        let conn = state.db()?;
        let inquiry = queries::get_inquiry(&conn, inquiry_id)?
            .ok_or_else(|| AppError::NotFound("inquiry not found".to_string()))?;
        if inquiry.status == InquiryStatus::Declined {
            return Err(AppError::Conflict("inquiry was declined".to_string()));
        }

        let code = SeasonalCode {
            code: generate_code(),
            inquiry_id: inquiry.id.clone(),
            discount_percent,
            expires_at: now + Duration::days(CODE_VALID_DAYS),
            used_at: None,
            created_at: now,
        };
        // a new approval replaces any code issued before
        let tx = conn.unchecked_transaction()?;
        let replaced = queries::expire_unused_codes(&tx, &inquiry.id, now)?;
        queries::create_code(&tx, &code)?;
        queries::update_inquiry_status(&tx, &inquiry.id, InquiryStatus::Approved)?;
        tx.commit()?;
        if replaced > 0 {
            tracing::info!(inquiry_id = %inquiry.id, replaced, "earlier seasonal codes withdrawn");
        }
        (inquiry, code)
    };
    tracing::info!(inquiry_id = %inquiry.id, discount_percent, "seasonal code issued");

    let msg = templates::seasonal_code(&inquiry, &code, &state.config.site_url);
    email::deliver(state.email.as_ref(), &msg).await;
    Ok(code)
}

pub async fn decline_inquiry(state: &AppState, inquiry_id: &str) -> Result<(), AppError> {
    let inquiry = {
        let conn = state.db()?;
        let inquiry = queries::get_inquiry(&conn, inquiry_id)?
            .ok_or_else(|| AppError::NotFound("inquiry not found".to_string()))?;
        let tx = conn.unchecked_transaction()?;
        queries::expire_unused_codes(&tx, &inquiry.id, Utc::now().naive_utc())?;
        queries::update_inquiry_status(&tx, &inquiry.id, InquiryStatus::Declined)?;
        tx.commit()?;
        inquiry
    };
    tracing::info!(inquiry_id = %inquiry.id, "seasonal inquiry declined");

    let msg = templates::inquiry_declined(&inquiry);
    email::deliver(state.email.as_ref(), &msg).await;
    Ok(())
}

pub fn verify_code(state: &AppState, raw: &str) -> Result<CodeVerification, AppError> {
    let code = normalize_code(raw);
    if code.is_empty() {
        return Err(AppError::Validation("code is required".to_string()));
    }
    let conn = state.db()?;
    let (code, inquiry) = check_code(&conn, &code, Utc::now().naive_utc())?;
    Ok(CodeVerification {
        code: code.code,
        discount_percent: code.discount_percent,
        check_in: inquiry.check_in,
        check_out: inquiry.check_out,
        guests: inquiry.guests,
        expires_at: code.expires_at,
    })
}
