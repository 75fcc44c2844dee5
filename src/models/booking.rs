use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A direct booking. Amounts are EUR cents; `check_out` is exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub guests: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub nightly_rate: i64,
    pub subtotal: i64,
    pub discount_percent: i64,
    pub cleaning_fee: i64,
    pub total_price: i64,
    pub deposit_required: i64,
    pub balance_due: i64,
    pub status: BookingStatus,
    pub seasonal_code: Option<String>,
    pub deposit_session_id: Option<String>,
    pub deposit_payment_id: Option<String>,
    pub balance_session_id: Option<String>,
    pub balance_payment_id: Option<String>,
    pub calendar_event_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    DepositPaid,
    BalanceDue,
    Confirmed,
    Completed,
    Cancelled,
}

/// Something that moves a booking along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    DepositPaid,
    BalanceRequested,
    BalancePaid,
    StayCompleted,
    Cancel,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot apply {event:?} to a booking in status {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: BookingEvent,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::DepositPaid => "deposit_paid",
            BookingStatus::BalanceDue => "balance_due",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "deposit_paid" => Some(BookingStatus::DepositPaid),
            "balance_due" => Some(BookingStatus::BalanceDue),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether a booking in this status blocks its dates on the calendar.
    /// A pending booking has not paid anything yet and holds nothing.
    pub fn holds_dates(&self) -> bool {
        matches!(
            self,
            BookingStatus::DepositPaid
                | BookingStatus::BalanceDue
                | BookingStatus::Confirmed
                | BookingStatus::Completed
        )
    }

    pub fn apply(self, event: BookingEvent) -> Result<BookingStatus, TransitionError> {
        use BookingEvent as E;
        use BookingStatus as S;

        let next = match (self, event) {
            (S::Pending, E::DepositPaid) => S::DepositPaid,
            (S::DepositPaid, E::BalanceRequested) => S::BalanceDue,
            (S::DepositPaid | S::BalanceDue, E::BalancePaid) => S::Confirmed,
            (S::Confirmed, E::StayCompleted) => S::Completed,
            (S::Pending | S::DepositPaid | S::BalanceDue, E::Cancel) => S::Cancelled,
            _ => {
                return Err(TransitionError {
                    from: self.as_str(),
                    event,
                })
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of the price a Checkout session collects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Deposit,
    Balance,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Deposit => "deposit",
            PaymentKind::Balance => "balance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(PaymentKind::Deposit),
            "balance" => Some(PaymentKind::Balance),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let s = BookingStatus::Pending;
        let s = s.apply(BookingEvent::DepositPaid).unwrap();
        assert_eq!(s, BookingStatus::DepositPaid);
        let s = s.apply(BookingEvent::BalancePaid).unwrap();
        assert_eq!(s, BookingStatus::Confirmed);
        let s = s.apply(BookingEvent::StayCompleted).unwrap();
        assert_eq!(s, BookingStatus::Completed);
    }

    #[test]
    fn test_balance_due_path() {
        let s = BookingStatus::DepositPaid
            .apply(BookingEvent::BalanceRequested)
            .unwrap();
        assert_eq!(s, BookingStatus::BalanceDue);
        assert_eq!(
            s.apply(BookingEvent::BalancePaid).unwrap(),
            BookingStatus::Confirmed
        );
    }

    #[test]
    fn test_cancel_allowed_before_confirmation() {
        for s in [
            BookingStatus::Pending,
            BookingStatus::DepositPaid,
            BookingStatus::BalanceDue,
        ] {
            assert_eq!(s.apply(BookingEvent::Cancel).unwrap(), BookingStatus::Cancelled);
        }
    }

    #[test]
    fn test_cancel_rejected_after_confirmation() {
        assert!(BookingStatus::Confirmed.apply(BookingEvent::Cancel).is_err());
        assert!(BookingStatus::Completed.apply(BookingEvent::Cancel).is_err());
        assert!(BookingStatus::Cancelled.apply(BookingEvent::Cancel).is_err());
    }

    #[test]
    fn test_duplicate_deposit_rejected() {
        let err = BookingStatus::DepositPaid
            .apply(BookingEvent::DepositPaid)
            .unwrap_err();
        assert_eq!(err.from, "deposit_paid");
        assert_eq!(err.event, BookingEvent::DepositPaid);
    }

    #[test]
    fn test_balance_before_deposit_rejected() {
        assert!(BookingStatus::Pending.apply(BookingEvent::BalancePaid).is_err());
        assert!(BookingStatus::Pending
            .apply(BookingEvent::BalanceRequested)
            .is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for s in [
            BookingStatus::Pending,
            BookingStatus::DepositPaid,
            BookingStatus::BalanceDue,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(BookingStatus::parse("bogus"), None);
    }

    #[test]
    fn test_holds_dates() {
        assert!(!BookingStatus::Pending.holds_dates());
        assert!(BookingStatus::DepositPaid.holds_dates());
        assert!(BookingStatus::Confirmed.holds_dates());
        assert!(!BookingStatus::Cancelled.holds_dates());
    }
}
