use chrono::NaiveDate;
use serde::Serialize;

use crate::config::PricingConfig;
use crate::services::season;

pub const DEPOSIT_PERCENT: i64 = 30;

/// Price breakdown for a stay. Amounts are EUR cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub nights: i64,
    pub nightly_rate: i64,
    pub subtotal: i64,
    pub discount_percent: i64,
    pub discount: i64,
    pub cleaning_fee: i64,
    pub total: i64,
    pub deposit: i64,
    pub balance: i64,
}

pub fn quote(
    pricing: &PricingConfig,
    check_in: NaiveDate,
    check_out: NaiveDate,
    discount_percent: i64,
) -> Quote {
    let (high, off) = season::nights_by_season(check_in, check_out);
    let nights = high + off;
    let nightly_rate = if high > 0 {
        pricing.high_season_rate
    } else {
        pricing.off_season_rate
    };

    let subtotal = nights * nightly_rate;
    let discount_percent = discount_percent.clamp(0, 100);
    let discount = subtotal * discount_percent / 100;
    let total = subtotal - discount + pricing.cleaning_fee;
    let (deposit, balance) = split_deposit(total);

    Quote {
        nights,
        nightly_rate,
        subtotal,
        discount_percent,
        discount,
        cleaning_fee: pricing.cleaning_fee,
        total,
        deposit,
        balance,
    }
}

/// Splits a total into (deposit, balance). The balance is derived from the
/// deposit so the two always add back up to the total.
pub fn split_deposit(total: i64) -> (i64, i64) {
    let deposit = (total * DEPOSIT_PERCENT + 50) / 100;
    (deposit, total - deposit)
}

/// Formats cents as a euro amount, e.g. `1234.50 €`.
pub fn format_eur(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{sign}{}.{:02} €", cents / 100, cents % 100)
}
