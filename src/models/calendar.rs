use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// First and last day of a calendar month.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// (year, month) pairs touched by the nights `[start, end)`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = vec![];
    for day in start.iter_days().take_while(|d| *d < end) {
        let key = (day.year(), day.month());
        if months.last() != Some(&key) {
            months.push(key);
        }
    }
    months
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    High,
    Off,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::High => "high",
            Season::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Available,
    Family,
    Owner,
    Booked,
}

impl DayStatus {
    fn rank(&self) -> u8 {
        match self {
            DayStatus::Available => 0,
            DayStatus::Family => 1,
            DayStatus::Owner => 2,
            DayStatus::Booked => 3,
        }
    }

    /// Picks the status that wins when two sources disagree about a day.
    pub fn merge(self, other: DayStatus) -> DayStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub status: DayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest: Option<String>,
}

impl CalendarDay {
    pub fn available(date: NaiveDate) -> Self {
        Self {
            date,
            status: DayStatus::Available,
            season: None,
            guest: None,
        }
    }

    /// Folds another source's view of this day in. The annotation follows
    /// whichever status wins.
    pub fn mark(&mut self, status: DayStatus, guest: Option<&str>) {
        let merged = self.status.merge(status);
        if merged != self.status {
            self.guest = guest.map(str::to_string);
        } else if merged == status && self.guest.is_none() {
            self.guest = guest.map(str::to_string);
        }
        self.status = merged;
    }
}
