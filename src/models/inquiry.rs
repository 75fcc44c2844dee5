use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A prospective guest asking about high-season dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalInquiry {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    pub message: Option<String>,
    pub status: InquiryStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    New,
    Approved,
    Declined,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::New => "new",
            InquiryStatus::Approved => "approved",
            InquiryStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => InquiryStatus::Approved,
            "declined" => InquiryStatus::Declined,
            _ => InquiryStatus::New,
        }
    }
}

/// One-time code that lets the inquiring guest book high-season dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalCode {
    pub code: String,
    pub inquiry_id: String,
    pub discount_percent: i64,
    pub expires_at: NaiveDateTime,
    pub used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}
