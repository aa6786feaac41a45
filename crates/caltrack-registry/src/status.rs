//! Calibration status classification.
//!
//! Pure functions only: no I/O, no clock reads. Callers pass `today`
//! explicitly so the same inputs always classify the same way, which the
//! dashboard counts, report ordering and reminder eligibility all rely on.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::DATE_FORMAT;

/// Days ahead of the due date during which an instrument counts as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationState {
    /// Due date has passed.
    Overdue,
    /// Due today or within the next 30 days.
    Upcoming,
    /// Due more than 30 days from now.
    Current,
    /// Inputs could not be classified (bad date, bad frequency).
    Unknown,
}

impl CalibrationState {
    /// States that make an instrument eligible for a reminder.
    pub fn needs_attention(self) -> bool {
        matches!(self, CalibrationState::Overdue | CalibrationState::Upcoming)
    }

    /// Capitalised label used in notification bodies.
    pub fn title(self) -> &'static str {
        match self {
            CalibrationState::Overdue => "Overdue",
            CalibrationState::Upcoming => "Upcoming",
            CalibrationState::Current => "Current",
            CalibrationState::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CalibrationState::Overdue => "overdue",
            CalibrationState::Upcoming => "upcoming",
            CalibrationState::Current => "current",
            CalibrationState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Result of [`classify`]: the state plus a non-negative day count.
///
/// `days` is days past due for `Overdue`, days remaining otherwise, and 0
/// for `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub state: CalibrationState,
    pub days: i64,
}

impl CalibrationStatus {
    pub const UNKNOWN: Self = Self {
        state: CalibrationState::Unknown,
        days: 0,
    };
}

/// Date the next calibration falls due, or `None` when it cannot be computed.
pub fn next_due_date(last_calibration: NaiveDate, frequency_days: i64) -> Option<NaiveDate> {
    if frequency_days <= 0 {
        return None;
    }
    last_calibration.checked_add_signed(Duration::try_days(frequency_days)?)
}

/// Classify an instrument's calibration state as of `today`.
///
/// `last_calibration` is `None` when the stored date was missing or
/// malformed; that, a non-positive frequency, or date overflow yields
/// [`CalibrationStatus::UNKNOWN`] and a warning log instead of an error.
pub fn classify(
    last_calibration: Option<NaiveDate>,
    frequency_days: i64,
    today: NaiveDate,
) -> CalibrationStatus {
    let Some(last) = last_calibration else {
        warn!("cannot classify: last calibration date missing or malformed");
        return CalibrationStatus::UNKNOWN;
    };
    let Some(next_due) = next_due_date(last, frequency_days) else {
        warn!(%last, frequency_days, "cannot classify: invalid calibration frequency");
        return CalibrationStatus::UNKNOWN;
    };

    let days_until = (next_due - today).num_days();
    if days_until < 0 {
        CalibrationStatus {
            state: CalibrationState::Overdue,
            days: days_until.abs(),
        }
    } else if days_until <= UPCOMING_WINDOW_DAYS {
        CalibrationStatus {
            state: CalibrationState::Upcoming,
            days: days_until,
        }
    } else {
        CalibrationStatus {
            state: CalibrationState::Current,
            days: days_until,
        }
    }
}

/// Same as [`classify`] for a raw `YYYY-MM-DD` string.
pub fn classify_raw(last_calibration: &str, frequency_days: i64, today: NaiveDate) -> CalibrationStatus {
    match NaiveDate::parse_from_str(last_calibration.trim(), DATE_FORMAT) {
        Ok(date) => classify(Some(date), frequency_days, today),
        Err(e) => {
            warn!(value = %last_calibration, error = %e, "cannot classify: unparseable calibration date");
            CalibrationStatus::UNKNOWN
        }
    }
}
