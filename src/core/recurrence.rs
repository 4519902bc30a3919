//! Recurrence patterns and their validation.
//!
//! A `RecurrenceSpec` is a five-field wildcard pattern over minute, hour,
//! day-of-week, day-of-month, and month. A field left as `None` matches
//! any value.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when validating a recurrence pattern.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Minute outside [0, 59].
    #[error("minute out of range: {0}")]
    InvalidMinute(u32),

    /// Hour outside [0, 23].
    #[error("hour out of range: {0}")]
    InvalidHour(u32),

    /// Day of week outside [1, 7].
    #[error("day of week out of range: {0}")]
    InvalidDayOfWeek(u32),

    /// Day of month outside [1, 31].
    #[error("day of month out of range: {0}")]
    InvalidDayOfMonth(u32),

    /// Month outside [0, 11].
    #[error("month out of range: {0}")]
    InvalidMonth(u32),

    /// Day of month does not exist in the target month.
    #[error("day {day} does not exist in month {month}")]
    DayNotInMonth { day: u32, month: u32 },
}

/// A wildcard time pattern.
///
/// Months are 0-indexed (0 = January). Days of week run 1-7 with
/// 1 = Sunday. All fields default to wildcard.
///
/// # Example
///
/// ```ignore
/// use cadence::RecurrenceSpec;
///
/// // Every day at 06:30
/// let spec = RecurrenceSpec::new().with_minute(30).with_hour(6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    /// Minute of the hour, [0, 59].
    #[serde(default)]
    pub minute: Option<u32>,
    /// Hour of the day, [0, 23].
    #[serde(default)]
    pub hour: Option<u32>,
    /// Day of the week, [1, 7], 1 = Sunday.
    #[serde(default)]
    pub day_of_week: Option<u32>,
    /// Day of the month, [1, 31].
    #[serde(default)]
    pub day_of_month: Option<u32>,
    /// Month of the year, [0, 11].
    #[serde(default)]
    pub month: Option<u32>,
}

impl RecurrenceSpec {
    /// Create a pattern with every field wildcarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minute field.
    pub fn with_minute(mut self, minute: u32) -> Self {
        self.minute = Some(minute);
        self
    }

    /// Set the hour field.
    pub fn with_hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }

    /// Set the day-of-week field (1 = Sunday).
    pub fn with_day_of_week(mut self, day_of_week: u32) -> Self {
        self.day_of_week = Some(day_of_week);
        self
    }

    /// Set the day-of-month field.
    pub fn with_day_of_month(mut self, day_of_month: u32) -> Self {
        self.day_of_month = Some(day_of_month);
        self
    }

    /// Set the month field (0 = January).
    pub fn with_month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Check whether every field is wildcarded.
    pub fn is_unconstrained(&self) -> bool {
        self.minute.is_none()
            && self.hour.is_none()
            && self.day_of_week.is_none()
            && self.day_of_month.is_none()
            && self.month.is_none()
    }

    /// Validate all fields against their bounds.
    ///
    /// `reference` supplies the year (and month, when the month field is
    /// wildcard) used to check that a concrete day-of-month actually
    /// exists in the target month. An invalid pattern is rejected whole;
    /// no field is ever partially applied.
    pub fn validate(&self, reference: NaiveDateTime) -> Result<(), SpecError> {
        if let Some(minute) = self.minute
            && minute > 59
        {
            return Err(SpecError::InvalidMinute(minute));
        }

        if let Some(hour) = self.hour
            && hour > 23
        {
            return Err(SpecError::InvalidHour(hour));
        }

        if let Some(dow) = self.day_of_week
            && !(1..=7).contains(&dow)
        {
            return Err(SpecError::InvalidDayOfWeek(dow));
        }

        if let Some(month) = self.month
            && month > 11
        {
            return Err(SpecError::InvalidMonth(month));
        }

        if let Some(dom) = self.day_of_month {
            if !(1..=31).contains(&dom) {
                return Err(SpecError::InvalidDayOfMonth(dom));
            }

            let month = self.month.unwrap_or(reference.month0());
            if dom > days_in_month(reference.year(), month) {
                return Err(SpecError::DayNotInMonth { day: dom, month });
            }
        }

        Ok(())
    }
}

/// Number of days in the given 0-indexed month of `year`.
pub(crate) fn days_in_month(year: i32, month0: u32) -> u32 {
    let (next_year, next_month) = if month0 >= 11 {
        (year + 1, 1)
    } else {
        (year, month0 + 2)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}
