use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Date format used for every calendar-date column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Operational state of an instrument (independent of calibration state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentStatus {
    #[default]
    Active,
    OutOfService,
    Repair,
}

impl std::fmt::Display for InstrumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstrumentStatus::Active => "active",
            InstrumentStatus::OutOfService => "out_of_service",
            InstrumentStatus::Repair => "repair",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InstrumentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(InstrumentStatus::Active),
            "out_of_service" => Ok(InstrumentStatus::OutOfService),
            "repair" => Ok(InstrumentStatus::Repair),
            other => Err(format!("unknown instrument status: {other}")),
        }
    }
}

/// A tracked instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    pub name: String,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub location: Option<String>,
    pub department_id: Option<i64>,
    /// `None` only when the stored value is not a valid `YYYY-MM-DD` date;
    /// such instruments classify as unknown.
    pub last_calibration_date: Option<NaiveDate>,
    /// Days between calibrations.
    pub calibration_frequency: i64,
    pub notes: Option<String>,
    pub status: InstrumentStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Instrument joined with the department it belongs to, if any.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentWithDepartment {
    pub instrument: Instrument,
    pub department: Option<Department>,
}

impl InstrumentWithDepartment {
    /// Reminder destination, when the department has one configured.
    pub fn manager_email(&self) -> Option<&str> {
        self.department
            .as_ref()
            .and_then(|d| d.manager_email.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    pub fn department_name(&self) -> &str {
        self.department
            .as_ref()
            .map(|d| d.name.as_str())
            .unwrap_or("No Department")
    }
}

/// Intake form for a new instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInstrument {
    pub name: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
    pub last_calibration_date: NaiveDate,
    pub calibration_frequency: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Edit form; replaces every descriptive field of an existing instrument.
pub type InstrumentUpdate = NewInstrument;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub manager_email: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    #[serde(default)]
    pub manager_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepairType {
    Maintenance,
    #[default]
    Repair,
    Replacement,
}

impl std::fmt::Display for RepairType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RepairType::Maintenance => "maintenance",
            RepairType::Repair => "repair",
            RepairType::Replacement => "replacement",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RepairType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "maintenance" => Ok(RepairType::Maintenance),
            "repair" => Ok(RepairType::Repair),
            "replacement" => Ok(RepairType::Replacement),
            other => Err(format!("unknown repair type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    #[default]
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RepairStatus::InProgress => "in_progress",
            RepairStatus::Completed => "completed",
            RepairStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RepairStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(RepairStatus::InProgress),
            "completed" => Ok(RepairStatus::Completed),
            "cancelled" => Ok(RepairStatus::Cancelled),
            other => Err(format!("unknown repair status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repair {
    pub id: i64,
    pub instrument_id: i64,
    pub repair_type: RepairType,
    pub description: String,
    pub cost: Option<Money>,
    pub technician: Option<String>,
    pub start_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub status: RepairStatus,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Repair row joined with its instrument's name for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RepairListing {
    #[serde(flatten)]
    pub repair: Repair,
    pub instrument_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRepair {
    pub instrument_id: i64,
    #[serde(default)]
    pub repair_type: RepairType,
    pub description: String,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub technician: Option<String>,
    /// Defaults to the caller's "today" when absent.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filter for the repairs listing. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairQuery {
    /// Substring matched against instrument name, description and technician.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<RepairStatus>,
}

/// Delivered-notification log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub instrument_id: i64,
    pub reminder_date: NaiveDate,
    pub reminder_type: String,
    pub email_sent: bool,
    /// RFC3339 timestamp of the successful send.
    pub sent_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub instrument_id: i64,
    pub reminder_date: NaiveDate,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}
