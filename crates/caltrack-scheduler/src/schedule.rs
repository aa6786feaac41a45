use caltrack_core::types::Schedule;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::error::{Result, SchedulerError};

/// Reject out-of-range fields before the engine starts.
pub fn validate(schedule: &Schedule) -> Result<()> {
    let check_time = |hour: u8, minute: u8| {
        if hour > 23 || minute > 59 {
            Err(SchedulerError::InvalidSchedule(format!(
                "time {hour:02}:{minute:02} is out of range"
            )))
        } else {
            Ok(())
        }
    };
    match schedule {
        Schedule::Once { .. } => Ok(()),
        Schedule::Interval { every_secs } => {
            if *every_secs == 0 || i64::try_from(*every_secs).is_err() {
                Err(SchedulerError::InvalidSchedule(format!(
                    "interval of {every_secs}s is not supported"
                )))
            } else {
                Ok(())
            }
        }
        Schedule::Daily { hour, minute } => check_time(*hour, *minute),
        Schedule::Weekly { day, hour, minute } => {
            if *day > 6 {
                return Err(SchedulerError::InvalidSchedule(format!(
                    "weekday {day} is out of range (0 = Monday … 6 = Sunday)"
                )));
            }
            check_time(*hour, *minute)
        }
    }
}

/// Compute the next UTC execution time for `schedule` strictly *after* `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` whose time has
/// passed) or its fields cannot form a valid time.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => (*at > from).then_some(*at),

        Schedule::Interval { every_secs } => {
            let secs = i64::try_from(*every_secs).ok().filter(|s| *s > 0)?;
            from.checked_add_signed(Duration::try_seconds(secs)?)
        }

        Schedule::Daily { hour, minute } => {
            let candidate = at_time(from, *hour, *minute)?;
            if candidate > from {
                Some(candidate)
            } else {
                // Today's window has passed, advance to tomorrow.
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // `day` follows ISO weekday numbering: 0=Monday … 6=Sunday,
            // which matches chrono's `num_days_from_monday`.
            if *day > 6 {
                return None;
            }
            let today_dow = from.weekday().num_days_from_monday() as i64;
            let days_ahead = (*day as i64 - today_dow).rem_euclid(7);
            let candidate = at_time(from + Duration::days(days_ahead), *hour, *minute)?;
            if candidate > from {
                Some(candidate)
            } else {
                // Same weekday, time already passed.
                Some(candidate + Duration::days(7))
            }
        }
    }
}

/// `day`'s date at HH:MM:00 UTC.
fn at_time(day: DateTime<Utc>, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(
        day.year(),
        day.month(),
        day.day(),
        hour as u32,
        minute as u32,
        0,
    )
    .single()
}
