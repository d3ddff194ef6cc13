//! Calendar date-time used by the RTC port, `SetTime` and the feed scheduler.
//!
//! Calendar rules and Unix conversion come from `chrono`; this type only
//! narrows the accepted range and keeps the broken-down fields the rest of
//! the firmware matches on.

use core::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Broken-down local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    /// Full year, e.g. 2024.
    pub year: u16,
    /// 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Earliest year the RTC accepts.
pub const MIN_YEAR: u16 = 2000;
/// Latest year the RTC accepts.
pub const MAX_YEAR: u16 = 2099;

impl DateTime {
    /// Build a validated date-time.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, &'static str> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err("year must be 2000-2099");
        }
        let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
            .ok_or("invalid calendar date")?;
        let time = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
            .ok_or("invalid time of day")?;
        Ok(Self::from_naive(date.and_time(time)))
    }

    fn from_naive(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }

    fn to_naive(self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        date.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }

    /// Seconds since 1970-01-01T00:00:00 (local time treated as UTC).
    /// Fields that do not form a calendar date map to the epoch.
    pub fn to_unix(&self) -> i64 {
        self.to_naive().map_or(0, |dt| dt.and_utc().timestamp())
    }

    /// Inverse of [`to_unix`](Self::to_unix). Out-of-range input maps to the epoch.
    pub fn from_unix(secs: i64) -> Self {
        let dt = chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0).unwrap_or_default();
        Self::from_naive(dt.naive_utc())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
