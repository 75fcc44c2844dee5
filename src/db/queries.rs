use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingStatus, InquiryStatus, PaymentKind, SeasonalCode, SeasonalInquiry,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_str() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map_err(|e| anyhow::anyhow!("bad timestamp {s:?}: {e}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| anyhow::anyhow!("bad date {s:?}: {e}"))
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, guest_name, guest_email, guest_phone, guests, check_in, check_out, \
     nights, nightly_rate, subtotal, discount_percent, cleaning_fee, total_price, deposit_required, \
     balance_due, status, seasonal_code, deposit_session_id, deposit_payment_id, balance_session_id, \
     balance_payment_id, calendar_event_id, notes, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)"
        ),
        params![
            booking.id,
            booking.guest_name,
            booking.guest_email,
            booking.guest_phone,
            booking.guests,
            booking.check_in.format(DATE_FORMAT).to_string(),
            booking.check_out.format(DATE_FORMAT).to_string(),
            booking.nights,
            booking.nightly_rate,
            booking.subtotal,
            booking.discount_percent,
            booking.cleaning_fee,
            booking.total_price,
            booking.deposit_required,
            booking.balance_due,
            booking.status.as_str(),
            booking.seasonal_code,
            booking.deposit_session_id,
            booking.deposit_payment_id,
            booking.balance_session_id,
            booking.balance_payment_id,
            booking.calendar_event_id,
            booking.notes,
            booking.created_at.format(TS_FORMAT).to_string(),
            booking.updated_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut bookings = vec![];
    match status_filter {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY check_in DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status, limit], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY check_in DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
    }
    Ok(bookings)
}

/// Bookings whose stay overlaps `[start, end)`, any status.
pub fn get_bookings_overlapping(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE check_in < ?2 AND check_out > ?1 ORDER BY check_in ASC"
    ))?;
    let rows = stmt.query_map(
        params![
            start.format(DATE_FORMAT).to_string(),
            end.format(DATE_FORMAT).to_string()
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Moves a booking from `from` to `to` only if it is still in `from`.
/// Returns false when another request got there first.
pub fn transition_booking_status(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now_str(), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn set_checkout_session(
    conn: &Connection,
    id: &str,
    kind: PaymentKind,
    session_id: &str,
) -> anyhow::Result<()> {
    let sql = match kind {
        PaymentKind::Deposit => {
            "UPDATE bookings SET deposit_session_id = ?1, updated_at = ?2 WHERE id = ?3"
        }
        PaymentKind::Balance => {
            "UPDATE bookings SET balance_session_id = ?1, updated_at = ?2 WHERE id = ?3"
        }
    };
    conn.execute(sql, params![session_id, now_str(), id])?;
    Ok(())
}

pub fn set_payment_reference(
    conn: &Connection,
    id: &str,
    kind: PaymentKind,
    payment_id: &str,
) -> anyhow::Result<()> {
    let sql = match kind {
        PaymentKind::Deposit => {
            "UPDATE bookings SET deposit_payment_id = ?1, updated_at = ?2 WHERE id = ?3"
        }
        PaymentKind::Balance => {
            "UPDATE bookings SET balance_payment_id = ?1, updated_at = ?2 WHERE id = ?3"
        }
    };
    conn.execute(sql, params![payment_id, now_str(), id])?;
    Ok(())
}

pub fn set_calendar_event(
    conn: &Connection,
    id: &str,
    event_id: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE bookings SET calendar_event_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![event_id, now_str(), id],
    )?;
    Ok(())
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let check_in: String = row.get(5)?;
    let check_out: String = row.get(6)?;
    let status_str: String = row.get(15)?;
    let created_at: String = row.get(23)?;
    let updated_at: String = row.get(24)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        guest_name: row.get(1)?,
        guest_email: row.get(2)?,
        guest_phone: row.get(3)?,
        guests: row.get(4)?,
        check_in: parse_date(&check_in)?,
        check_out: parse_date(&check_out)?,
        nights: row.get(7)?,
        nightly_rate: row.get(8)?,
        subtotal: row.get(9)?,
        discount_percent: row.get(10)?,
        cleaning_fee: row.get(11)?,
        total_price: row.get(12)?,
        deposit_required: row.get(13)?,
        balance_due: row.get(14)?,
        status,
        seasonal_code: row.get(16)?,
        deposit_session_id: row.get(17)?,
        deposit_payment_id: row.get(18)?,
        balance_session_id: row.get(19)?,
        balance_payment_id: row.get(20)?,
        calendar_event_id: row.get(21)?,
        notes: row.get(22)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Inquiries ──

pub fn create_inquiry(conn: &Connection, inquiry: &SeasonalInquiry) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO inquiries (id, guest_name, guest_email, guest_phone, check_in, check_out, guests, message, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            inquiry.id,
            inquiry.guest_name,
            inquiry.guest_email,
            inquiry.guest_phone,
            inquiry.check_in.format(DATE_FORMAT).to_string(),
            inquiry.check_out.format(DATE_FORMAT).to_string(),
            inquiry.guests,
            inquiry.message,
            inquiry.status.as_str(),
            inquiry.created_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

const INQUIRY_COLUMNS: &str =
    "id, guest_name, guest_email, guest_phone, check_in, check_out, guests, message, status, created_at";

pub fn get_inquiry(conn: &Connection, id: &str) -> anyhow::Result<Option<SeasonalInquiry>> {
    let result = conn
        .query_row(
            &format!("SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE id = ?1"),
            params![id],
            |row| Ok(parse_inquiry_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn list_inquiries(conn: &Connection, limit: i64) -> anyhow::Result<Vec<SeasonalInquiry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INQUIRY_COLUMNS} FROM inquiries ORDER BY created_at DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_inquiry_row(row)))?;

    let mut inquiries = vec![];
    for row in rows {
        inquiries.push(row??);
    }
    Ok(inquiries)
}

pub fn update_inquiry_status(
    conn: &Connection,
    id: &str,
    status: InquiryStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE inquiries SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_inquiry_row(row: &rusqlite::Row) -> anyhow::Result<SeasonalInquiry> {
    let check_in: String = row.get(4)?;
    let check_out: String = row.get(5)?;
    let status: String = row.get(8)?;
    let created_at: String = row.get(9)?;

    Ok(SeasonalInquiry {
        id: row.get(0)?,
        guest_name: row.get(1)?,
        guest_email: row.get(2)?,
        guest_phone: row.get(3)?,
        check_in: parse_date(&check_in)?,
        check_out: parse_date(&check_out)?,
        guests: row.get(6)?,
        message: row.get(7)?,
        status: InquiryStatus::parse(&status),
        created_at: parse_ts(&created_at)?,
    })
}

// ── Seasonal codes ──

pub fn create_code(conn: &Connection, code: &SeasonalCode) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO seasonal_codes (code, inquiry_id, discount_percent, expires_at, used_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            code.code,
            code.inquiry_id,
            code.discount_percent,
            code.expires_at.format(TS_FORMAT).to_string(),
            code.used_at.map(|t| t.format(TS_FORMAT).to_string()),
            code.created_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_code(conn: &Connection, code: &str) -> anyhow::Result<Option<SeasonalCode>> {
    let result = conn
        .query_row(
            "SELECT code, inquiry_id, discount_percent, expires_at, used_at, created_at
             FROM seasonal_codes WHERE code = ?1",
            params![code],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((code, inquiry_id, discount_percent, expires_at, used_at, created_at)) = result
    else {
        return Ok(None);
    };

    Ok(Some(SeasonalCode {
        code,
        inquiry_id,
        discount_percent,
        expires_at: parse_ts(&expires_at)?,
        used_at: used_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at)?,
    }))
}

/// Ends every unused code of an inquiry at `now`. Returns how many.
pub fn expire_unused_codes(
    conn: &Connection,
    inquiry_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE seasonal_codes SET expires_at = ?1 WHERE inquiry_id = ?2 AND used_at IS NULL",
        params![now.format(TS_FORMAT).to_string(), inquiry_id],
    )?;
    Ok(count)
}

/// Marks a code used. Only the first caller gets `true`.
pub fn mark_code_used(conn: &Connection, code: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE seasonal_codes SET used_at = ?1 WHERE code = ?2 AND used_at IS NULL",
        params![now_str(), code],
    )?;
    Ok(count > 0)
}
