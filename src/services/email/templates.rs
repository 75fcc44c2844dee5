use super::{Attachment, EmailMessage};
use crate::models::{Booking, SeasonalCode, SeasonalInquiry};
use crate::services::pricing::format_eur;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn stay_summary(b: &Booking) -> String {
    format!(
        "<ul>\
         <li>Check-in: {}</li>\
         <li>Check-out: {}</li>\
         <li>Nights: {}</li>\
         <li>Guests: {}</li>\
         <li>Total: {}</li>\
         <li>Deposit (30%): {}</li>\
         <li>Balance: {}</li>\
         </ul>",
        b.check_in.format("%A %d %B %Y"),
        b.check_out.format("%A %d %B %Y"),
        b.nights,
        b.guests,
        format_eur(b.total_price),
        format_eur(b.deposit_required),
        format_eur(b.balance_due),
    )
}

fn message(to: &str, subject: String, body: String) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject,
        html: format!("<div style=\"font-family:sans-serif\">{body}<p>Casa Vistas</p></div>"),
        attachments: vec![],
    }
}

pub fn booking_received(b: &Booking, checkout_url: &str) -> EmailMessage {
    message(
        &b.guest_email,
        "Your Casa Vistas booking request".to_string(),
        format!(
            "<p>Hello {},</p>\
             <p>We have received your booking request. Your dates are held once the deposit is paid.</p>\
             {}\
             <p><a href=\"{}\">Pay the deposit</a></p>",
            escape(&b.guest_name),
            stay_summary(b),
            escape(checkout_url),
        ),
    )
}

pub fn deposit_confirmed(b: &Booking, ics: &str) -> EmailMessage {
    let mut msg = message(
        &b.guest_email,
        "Deposit received: your stay at Casa Vistas".to_string(),
        format!(
            "<p>Hello {},</p>\
             <p>Thank you, your deposit of {} has been received and your dates are reserved.</p>\
             {}\
             <p>We will send you a link for the remaining {} before your arrival.</p>",
            escape(&b.guest_name),
            format_eur(b.deposit_required),
            stay_summary(b),
            format_eur(b.balance_due),
        ),
    );
    msg.attachments.push(Attachment {
        filename: "casa-vistas.ics".to_string(),
        content_type: "text/calendar".to_string(),
        content: ics.as_bytes().to_vec(),
    });
    msg
}

pub fn owner_deposit_paid(owner_email: &str, b: &Booking) -> EmailMessage {
    message(
        owner_email,
        format!(
            "New booking: {} ({} to {})",
            b.guest_name,
            b.check_in.format("%Y-%m-%d"),
            b.check_out.format("%Y-%m-%d")
        ),
        format!(
            "<p>{} ({}) paid the deposit for booking {}.</p>{}",
            escape(&b.guest_name),
            escape(&b.guest_email),
            escape(&b.id),
            stay_summary(b),
        ),
    )
}

pub fn balance_request(b: &Booking, checkout_url: &str) -> EmailMessage {
    message(
        &b.guest_email,
        "Balance payment for your Casa Vistas stay".to_string(),
        format!(
            "<p>Hello {},</p>\
             <p>The remaining balance of {} for your stay is now due.</p>\
             {}\
             <p><a href=\"{}\">Pay the balance</a></p>",
            escape(&b.guest_name),
            format_eur(b.balance_due),
            stay_summary(b),
            escape(checkout_url),
        ),
    )
}

pub fn balance_confirmed(b: &Booking) -> EmailMessage {
    message(
        &b.guest_email,
        "Your Casa Vistas stay is fully paid".to_string(),
        format!(
            "<p>Hello {},</p>\
             <p>We received your balance payment. Your booking is confirmed.</p>{}",
            escape(&b.guest_name),
            stay_summary(b),
        ),
    )
}

pub fn owner_inquiry(owner_email: &str, inquiry: &SeasonalInquiry) -> EmailMessage {
    message(
        owner_email,
        format!("High-season inquiry from {}", inquiry.guest_name),
        format!(
            "<p>{} ({}) asks about {} to {} for {} guests.</p><p>{}</p><p>Inquiry id: {}</p>",
            escape(&inquiry.guest_name),
            escape(&inquiry.guest_email),
            inquiry.check_in.format("%Y-%m-%d"),
            inquiry.check_out.format("%Y-%m-%d"),
            inquiry.guests,
            escape(inquiry.message.as_deref().unwrap_or("")),
            escape(&inquiry.id),
        ),
    )
}

pub fn seasonal_code(inquiry: &SeasonalInquiry, code: &SeasonalCode, site_url: &str) -> EmailMessage {
    let discount = if code.discount_percent > 0 {
        format!("<p>A {}% discount has been applied to this code.</p>", code.discount_percent)
    } else {
        String::new()
    };
    message(
        &inquiry.guest_email,
        "Your Casa Vistas booking code".to_string(),
        format!(
            "<p>Hello {},</p>\
             <p>Good news, your dates ({} to {}) are open to you. Use this code to book:</p>\
             <p style=\"font-size:24px;letter-spacing:4px\"><strong>{}</strong></p>\
             {}\
             <p>The code can be used once and expires on {}.</p>\
             <p><a href=\"{}/book?code={}\">Book now</a></p>",
            escape(&inquiry.guest_name),
            inquiry.check_in.format("%Y-%m-%d"),
            inquiry.check_out.format("%Y-%m-%d"),
            escape(&code.code),
            discount,
            code.expires_at.format("%Y-%m-%d"),
            escape(site_url.trim_end_matches('/')),
            escape(&code.code),
        ),
    )
}

pub fn inquiry_declined(inquiry: &SeasonalInquiry) -> EmailMessage {
    message(
        &inquiry.guest_email,
        "About your Casa Vistas inquiry".to_string(),
        format!(
            "<p>Hello {},</p>\
             <p>Unfortunately the house is not available for {} to {}. \
             Off-season dates can be booked directly on our website.</p>",
            escape(&inquiry.guest_name),
            inquiry.check_in.format("%Y-%m-%d"),
            inquiry.check_out.format("%Y-%m-%d"),
        ),
    )
}
