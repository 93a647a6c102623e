use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, swapping the bounds if they are given in reverse.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The `days` days up to and including `today`. Starts at [`NaiveDate::MIN`]
    /// when the window reaches past the calendar.
    pub fn lookback(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            end: today,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
