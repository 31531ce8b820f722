//! JDE-style date and time encoding used by the job feed.
//!
//! Dates are `CYYDDD`: century flag (0 = 1900s, 1 = 2000s), two digit
//! year and day of year. Times are `HHMMSS` packed into an integer.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JdeTimestamp {
    pub date: u32,
    pub time: u32,
}

impl JdeTimestamp {
    pub fn new(date: u32, time: u32) -> Self {
        Self { date, time }
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        let naive = dt.naive_utc();
        let years_since_1900 = (naive.year() - 1900).max(0) as u32;
        Self {
            date: years_since_1900 * 1000 + naive.ordinal(),
            time: naive.hour() * 10000 + naive.minute() * 100 + naive.second(),
        }
    }

    /// Convert back to a UTC instant. Returns `None` for encodings that do
    /// not name a real day or time of day.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let year = 1900 + (self.date / 1000) as i32;
        let day = NaiveDate::from_yo_opt(year, self.date % 1000)?;
        let time = NaiveTime::from_hms_opt(self.time / 10000, (self.time / 100) % 100, self.time % 100)?;
        Some(NaiveDateTime::new(day, time).and_utc())
    }
}
