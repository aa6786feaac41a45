//! Dashboard and report views built on the classifier.

use chrono::NaiveDate;
use serde::Serialize;

use crate::status::{classify, next_due_date, CalibrationState};
use crate::types::{Instrument, InstrumentWithDepartment};

/// One dashboard row.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub id: i64,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub department: String,
    pub last_calibration_date: Option<NaiveDate>,
    pub state: CalibrationState,
    pub days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub overdue: usize,
    pub upcoming: usize,
    pub current: usize,
    pub unknown: usize,
    pub repairs_in_progress: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub instruments: Vec<DashboardRow>,
    pub stats: DashboardStats,
}

/// Report row: the instrument plus its derived calibration schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub instrument: Instrument,
    pub state: CalibrationState,
    pub days: i64,
    pub next_calibration_date: Option<NaiveDate>,
}

/// Build the dashboard. Row order follows `instruments`.
pub fn dashboard(
    instruments: &[InstrumentWithDepartment],
    repairs_in_progress: u64,
    today: NaiveDate,
) -> Dashboard {
    let mut stats = DashboardStats {
        total: instruments.len(),
        repairs_in_progress,
        ..DashboardStats::default()
    };

    let rows = instruments
        .iter()
        .map(|entry| {
            let inst = &entry.instrument;
            let status = classify(inst.last_calibration_date, inst.calibration_frequency, today);
            match status.state {
                CalibrationState::Overdue => stats.overdue += 1,
                CalibrationState::Upcoming => stats.upcoming += 1,
                CalibrationState::Current => stats.current += 1,
                CalibrationState::Unknown => stats.unknown += 1,
            }
            DashboardRow {
                id: inst.id,
                name: inst.name.clone(),
                manufacturer: inst.manufacturer.clone(),
                model: inst.model.clone(),
                department: entry.department_name().to_string(),
                last_calibration_date: inst.last_calibration_date,
                state: status.state,
                days: status.days,
            }
        })
        .collect();

    Dashboard {
        instruments: rows,
        stats,
    }
}

/// Build the calibration report. Row order follows `instruments`.
pub fn calibration_report(instruments: &[Instrument], today: NaiveDate) -> Vec<ReportRow> {
    instruments
        .iter()
        .map(|inst| {
            let status = classify(inst.last_calibration_date, inst.calibration_frequency, today);
            ReportRow {
                instrument: inst.clone(),
                state: status.state,
                days: status.days,
                next_calibration_date: inst
                    .last_calibration_date
                    .and_then(|d| next_due_date(d, inst.calibration_frequency)),
            }
        })
        .collect()
}
