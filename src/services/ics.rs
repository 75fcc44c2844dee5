use chrono::Utc;

use crate::models::Booking;

/// Folds text per RFC 5545 escaping rules for TEXT values.
fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// An all-day VEVENT spanning the stay. DTEND is the check-out date, which
/// all-day events treat as exclusive.
pub fn generate_ics(booking: &Booking, property_name: &str) -> String {
    let dtstart = booking.check_in.format("%Y%m%d").to_string();
    let dtend = booking.check_out.format("%Y%m%d").to_string();
    let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@casavistas", booking.id);

    let summary = escape_text(&format!("Stay at {property_name}"));
    let description = escape_text(&format!(
        "Booking {} for {} guests, {} nights. Check-in from 16:00, check-out by 11:00.",
        booking.id, booking.guests, booking.nights
    ));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Casa Vistas//Bookings//EN\r\n\
         CALSCALE:GREGORIAN\r\n\
         METHOD:PUBLISH\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART;VALUE=DATE:{dtstart}\r\n\
         DTEND;VALUE=DATE:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:CONFIRMED\r\n\
         TRANSP:OPAQUE\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::{NaiveDate, NaiveDateTime};

    fn booking() -> Booking {
        let ts = NaiveDateTime::parse_from_str("2026-03-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Booking {
            id: "test-123".to_string(),
            guest_name: "Alice".to_string(),
            guest_email: "alice@example.com".to_string(),
            guest_phone: None,
            guests: 3,
            check_in: NaiveDate::from_ymd_opt(2026, 6, 12).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            nights: 7,
            nightly_rate: 18_000,
            subtotal: 126_000,
            discount_percent: 0,
            cleaning_fee: 12_000,
            total_price: 138_000,
            deposit_required: 41_400,
            balance_due: 96_600,
            status: BookingStatus::DepositPaid,
            seasonal_code: None,
            deposit_session_id: None,
            deposit_payment_id: None,
            balance_session_id: None,
            balance_payment_id: None,
            calendar_event_id: None,
            notes: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&booking(), "Casa Vistas");
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20260612"));
        assert!(ics.contains("DTEND;VALUE=DATE:20260619"));
        assert!(ics.contains("SUMMARY:Stay at Casa Vistas"));
        assert!(ics.contains("UID:test-123@casavistas"));
        assert!(ics.contains("END:VEVENT"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_description_escapes_commas() {
        let ics = generate_ics(&booking(), "Casa Vistas");
        assert!(ics.contains("for 3 guests\\, 7 nights. Check-in from 16:00\\, check-out"));
    }
}
