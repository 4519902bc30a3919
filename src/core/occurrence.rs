//! Next-occurrence calculation.
//!
//! `next_occurrence` is a pure function from a reference instant and a
//! recurrence pattern to the next matching instant. It is called once
//! when a task is scheduled and again after every firing, each time
//! anchored at the instant the firing observed.
//!
//! The calculation composes a candidate field by field: minute, hour,
//! then the day fields (day-of-week and day-of-month are alternatives;
//! when both are present the earlier resolution wins), then month, with
//! a final date normalization pass. Results are always strictly after
//! the reference instant and aligned to a minute boundary.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use std::time::Duration;
use thiserror::Error;

use super::recurrence::{RecurrenceSpec, days_in_month};

/// Errors that can occur while computing the next occurrence.
#[derive(Debug, Error)]
pub enum OccurrenceError {
    /// Calendar arithmetic left the representable date range.
    #[error("calendar arithmetic out of range")]
    OutOfRange,

    /// The computed instant did not advance past the reference instant.
    #[error("pattern yields no instant after {0}")]
    NotInFuture(NaiveDateTime),
}

/// One computed firing instant.
///
/// `window` is non-zero only when the pattern's target hour is already
/// in progress: the task then fires every minute for the remainder of
/// that clock hour before falling back to its normal cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// The instant at which the task fires next (naive local time).
    pub at: NaiveDateTime,
    /// Remaining every-minute window, zero outside the sub-mode.
    pub window: Duration,
}

/// Compute the next instant matching `spec` strictly after `current`.
pub fn next_occurrence(
    current: NaiveDateTime,
    spec: &RecurrenceSpec,
) -> Result<Occurrence, OccurrenceError> {
    let mut window = Duration::ZERO;

    // Minute field.
    let mut candidate = match (spec.minute, spec.hour) {
        (None, None) => zero_seconds(add_minutes(current, 1)?)?,
        (None, Some(_)) => {
            zero_seconds(current.with_minute(0).ok_or(OccurrenceError::OutOfRange)?)?
        }
        (Some(minute), _) => {
            let mut c = zero_seconds(
                current
                    .with_minute(minute)
                    .ok_or(OccurrenceError::OutOfRange)?,
            )?;
            if minute != 0 && spec.hour.is_none() && c <= current {
                c = add_hours(c, 1)?;
            }
            c
        }
    };

    // Hour field. A concrete minute of 0 with no hour constraint fires
    // once per hour, on the hour.
    if spec.minute == Some(0) && spec.hour.is_none() {
        candidate = add_hours(candidate, 1)?;
    }
    if let Some(hour) = spec.hour {
        candidate = candidate
            .with_hour(hour)
            .ok_or(OccurrenceError::OutOfRange)?;

        let day_fields_free = spec.day_of_week.is_none() && spec.day_of_month.is_none();
        let month_matches = spec.month.is_none_or(|m| m == current.month0());
        if candidate <= current && day_fields_free && month_matches {
            if spec.minute.is_none() && current.hour() == hour {
                // The target hour is in progress: tick every remaining
                // minute of this hour, then fall back to the daily cadence.
                let tick = zero_seconds(add_minutes(current, 1)?)?;
                if tick.hour() == hour {
                    window = Duration::from_secs(u64::from(59 - tick.minute()) * 60);
                    candidate = tick;
                } else {
                    candidate = add_days(candidate, 1)?;
                }
            } else {
                candidate = add_days(candidate, 1)?;
            }
        }
    }

    // Day fields. When both are present each is resolved independently
    // through its own month/year adjustments and the earlier result wins.
    candidate = match (spec.day_of_week, spec.day_of_month) {
        (None, None) => finish(candidate, current, spec, None)?,
        (Some(dow), None) => {
            let c = align_day_of_week(candidate, current, spec, dow)?;
            finish(c, current, spec, Some(dow))?
        }
        (None, Some(dom)) => {
            let c = align_day_of_month(candidate, current, spec, dom)?;
            finish(c, current, spec, None)?
        }
        (Some(dow), Some(dom)) => {
            let by_dow = finish(
                align_day_of_week(candidate, current, spec, dow)?,
                current,
                spec,
                Some(dow),
            )?;
            let by_dom = finish(
                align_day_of_month(candidate, current, spec, dom)?,
                current,
                spec,
                None,
            )?;
            by_dow.min(by_dom)
        }
    };

    if candidate <= current {
        return Err(OccurrenceError::NotInFuture(current));
    }

    Ok(Occurrence {
        at: candidate,
        window,
    })
}

/// Month alignment followed by date normalization.
fn finish(
    candidate: NaiveDateTime,
    current: NaiveDateTime,
    spec: &RecurrenceSpec,
    dow: Option<u32>,
) -> Result<NaiveDateTime, OccurrenceError> {
    let candidate = align_month(candidate, spec)?;
    normalize(candidate, current, spec, dow)
}

/// Advance the candidate to the next day matching `target` (1 = Sunday).
fn align_day_of_week(
    mut candidate: NaiveDateTime,
    current: NaiveDateTime,
    spec: &RecurrenceSpec,
    target: u32,
) -> Result<NaiveDateTime, OccurrenceError> {
    match spec.month {
        Some(month) if current.month0() < month => {
            // The constrained month is later this year: jump to its first
            // day and take the first matching weekday from there.
            let date = NaiveDate::from_ymd_opt(current.year(), month + 1, 1)
                .ok_or(OccurrenceError::OutOfRange)?;
            candidate = NaiveDateTime::new(date, candidate.time());
            candidate = advance_to_weekday(candidate, target)?;
        }
        Some(month) if month != current.month0() => {
            // Month already passed this year; the month step rolls the
            // year and normalization re-aligns the weekday.
        }
        _ => {
            let weekday = weekday_number(candidate);
            let days = if weekday < target {
                target - weekday
            } else if weekday > target {
                7 - (weekday - target)
            } else if candidate <= current {
                7
            } else {
                0
            };
            if days > 0 {
                candidate = add_days(candidate, u64::from(days))?;
            }
        }
    }
    Ok(candidate)
}

/// Move the candidate onto day `target` of the nearest month that both
/// admits it and keeps the result after `current`.
fn align_day_of_month(
    mut candidate: NaiveDateTime,
    current: NaiveDateTime,
    spec: &RecurrenceSpec,
    target: u32,
) -> Result<NaiveDateTime, OccurrenceError> {
    if target > days_in_month(candidate.year(), candidate.month0()) && spec.month.is_none() {
        candidate = advance_to_admitting_month(candidate, target)?;
    } else {
        candidate = match candidate.with_day(target) {
            Some(c) => c,
            None => advance_to_admitting_month(candidate, target)?,
        };
        if candidate <= current {
            candidate = candidate
                .checked_add_months(Months::new(1))
                .ok_or(OccurrenceError::OutOfRange)?;
            if candidate.day() != target {
                // Clamped by a shorter month; keep rolling until one
                // admits the requested day.
                candidate = advance_to_admitting_month(candidate, target)?;
            }
        }
    }
    Ok(candidate)
}

/// Advance the candidate to the constrained month, rolling into the next
/// year when the month has already passed.
fn align_month(
    candidate: NaiveDateTime,
    spec: &RecurrenceSpec,
) -> Result<NaiveDateTime, OccurrenceError> {
    let Some(target) = spec.month else {
        return Ok(candidate);
    };
    let month = candidate.month0();
    if month == target {
        return Ok(candidate);
    }

    let months = if month < target {
        target - month
    } else {
        12 - month + target
    };
    let mut c = candidate
        .checked_add_months(Months::new(months))
        .ok_or(OccurrenceError::OutOfRange)?;
    if spec.day_of_week.is_none() && spec.day_of_month.is_none() {
        c = c.with_day(1).ok_or(OccurrenceError::OutOfRange)?;
    }
    Ok(c)
}

/// Final date normalization.
///
/// With no time-of-day constraint a date move resets the clock to
/// midnight. A year rollover with a weekday constraint re-anchors the
/// candidate at the first matching weekday of the target month.
fn normalize(
    mut candidate: NaiveDateTime,
    current: NaiveDateTime,
    spec: &RecurrenceSpec,
    dow: Option<u32>,
) -> Result<NaiveDateTime, OccurrenceError> {
    if spec.minute.is_none() && spec.hour.is_none() && candidate.date() > current.date() {
        candidate = candidate
            .date()
            .and_hms_opt(0, 0, 0)
            .ok_or(OccurrenceError::OutOfRange)?;
    }

    if candidate.year() > current.year()
        && let Some(target) = dow
    {
        let misaligned = weekday_number(candidate) != target
            || (spec.day_of_month.is_none() && candidate.day() != 1);
        if misaligned {
            candidate = candidate.with_day(1).ok_or(OccurrenceError::OutOfRange)?;
            candidate = advance_to_weekday(candidate, target)?;
        }
    }

    Ok(candidate)
}

/// Day of week as 1-7 with 1 = Sunday.
fn weekday_number(dt: NaiveDateTime) -> u32 {
    dt.weekday().num_days_from_sunday() + 1
}

fn advance_to_weekday(
    mut candidate: NaiveDateTime,
    target: u32,
) -> Result<NaiveDateTime, OccurrenceError> {
    while weekday_number(candidate) != target {
        candidate = add_days(candidate, 1)?;
    }
    Ok(candidate)
}

fn advance_to_admitting_month(
    mut candidate: NaiveDateTime,
    day: u32,
) -> Result<NaiveDateTime, OccurrenceError> {
    // Any 31-day request is admitted at least every other month, so a
    // bounded scan is enough.
    for _ in 0..48 {
        candidate = candidate
            .checked_add_months(Months::new(1))
            .ok_or(OccurrenceError::OutOfRange)?;
        if days_in_month(candidate.year(), candidate.month0()) >= day {
            return candidate.with_day(day).ok_or(OccurrenceError::OutOfRange);
        }
    }
    Err(OccurrenceError::OutOfRange)
}

fn zero_seconds(dt: NaiveDateTime) -> Result<NaiveDateTime, OccurrenceError> {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .ok_or(OccurrenceError::OutOfRange)
}

fn add_minutes(dt: NaiveDateTime, minutes: i64) -> Result<NaiveDateTime, OccurrenceError> {
    dt.checked_add_signed(TimeDelta::minutes(minutes))
        .ok_or(OccurrenceError::OutOfRange)
}

fn add_hours(dt: NaiveDateTime, hours: i64) -> Result<NaiveDateTime, OccurrenceError> {
    dt.checked_add_signed(TimeDelta::hours(hours))
        .ok_or(OccurrenceError::OutOfRange)
}

fn add_days(dt: NaiveDateTime, days: u64) -> Result<NaiveDateTime, OccurrenceError> {
    dt.checked_add_days(Days::new(days))
        .ok_or(OccurrenceError::OutOfRange)
}
