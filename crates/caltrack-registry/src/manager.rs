use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::instrument;

use crate::error::Result;
use crate::report::{self, Dashboard, ReportRow};
use crate::types::*;
use crate::{db, departments, instruments, reminders, repairs};

/// Thread-safe handle to the calibration store.
///
/// Wraps a single SQLite connection in a `Mutex`; SQLite itself serializes
/// writers, so no further locking happens here. Every method takes and
/// releases the lock within the call, so callers may hold a `Registry`
/// across `.await` points freely.
pub struct Registry {
    db: Mutex<Connection>,
}

impl Registry {
    /// Wrap an already-open connection, creating tables if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store with the schema applied. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves no partial Rust state worth discarding.
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seed_default_departments(&self) -> Result<usize> {
        Ok(db::seed_default_departments(&self.conn())?)
    }

    // --- instruments -------------------------------------------------------

    pub fn list_instruments(&self) -> Result<Vec<Instrument>> {
        instruments::list_instruments(&self.conn())
    }

    #[instrument(skip(self))]
    pub fn list_with_departments(&self) -> Result<Vec<InstrumentWithDepartment>> {
        instruments::list_with_departments(&self.conn())
    }

    pub fn get_instrument(&self, id: i64) -> Result<Option<Instrument>> {
        instruments::get_instrument(&self.conn(), id)
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    pub fn create_instrument(&self, new: &NewInstrument) -> Result<Instrument> {
        instruments::create_instrument(&self.conn(), new)
    }

    #[instrument(skip(self, update))]
    pub fn update_instrument(&self, id: i64, update: &InstrumentUpdate) -> Result<Instrument> {
        instruments::update_instrument(&self.conn(), id, update)
    }

    #[instrument(skip(self))]
    pub fn calibrate_instrument(&self, id: i64, date: NaiveDate) -> Result<()> {
        instruments::calibrate_instrument(&self.conn(), id, date)
    }

    #[instrument(skip(self))]
    pub fn set_instrument_status(&self, id: i64, status: InstrumentStatus) -> Result<()> {
        instruments::set_instrument_status(&self.conn(), id, status)
    }

    #[instrument(skip(self))]
    pub fn delete_instrument(&self, id: i64) -> Result<()> {
        instruments::delete_instrument(&self.conn(), id)
    }

    // --- departments -------------------------------------------------------

    pub fn list_departments(&self) -> Result<Vec<Department>> {
        departments::list_departments(&self.conn())
    }

    pub fn get_department(&self, id: i64) -> Result<Option<Department>> {
        departments::get_department(&self.conn(), id)
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    pub fn create_department(&self, new: &NewDepartment) -> Result<Department> {
        departments::create_department(&self.conn(), new)
    }

    #[instrument(skip(self, update))]
    pub fn update_department(&self, id: i64, update: &NewDepartment) -> Result<Department> {
        departments::update_department(&self.conn(), id, update)
    }

    #[instrument(skip(self))]
    pub fn delete_department(&self, id: i64) -> Result<usize> {
        departments::delete_department(&self.conn(), id)
    }

    // --- repairs -----------------------------------------------------------

    pub fn list_repairs(&self, query: &RepairQuery) -> Result<Vec<RepairListing>> {
        repairs::list_repairs(&self.conn(), query)
    }

    pub fn get_repair(&self, id: i64) -> Result<Option<Repair>> {
        repairs::get_repair(&self.conn(), id)
    }

    #[instrument(skip(self, new), fields(instrument_id = new.instrument_id))]
    pub fn create_repair(&self, new: &NewRepair, today: NaiveDate) -> Result<Repair> {
        repairs::create_repair(&self.conn(), new, today)
    }

    #[instrument(skip(self))]
    pub fn complete_repair(&self, id: i64, completed_on: NaiveDate) -> Result<Repair> {
        repairs::complete_repair(&self.conn(), id, completed_on)
    }

    // --- reminders ---------------------------------------------------------

    pub fn insert_reminder(&self, new: &NewReminder) -> Result<Reminder> {
        reminders::insert_reminder(&self.conn(), new)
    }

    pub fn reminders_for_instrument(&self, instrument_id: i64) -> Result<Vec<Reminder>> {
        reminders::list_for_instrument(&self.conn(), instrument_id)
    }

    pub fn recent_reminders(&self, limit: usize) -> Result<Vec<Reminder>> {
        reminders::list_recent(&self.conn(), limit)
    }

    pub fn reminder_sent_on(&self, instrument_id: i64, date: NaiveDate) -> Result<bool> {
        reminders::sent_on(&self.conn(), instrument_id, date)
    }

    // --- views -------------------------------------------------------------

    pub fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let conn = self.conn();
        let all = instruments::list_with_departments(&conn)?;
        let in_progress = repairs::count_in_progress(&conn)?;
        Ok(report::dashboard(&all, in_progress, today))
    }

    pub fn calibration_report(&self, today: NaiveDate) -> Result<Vec<ReportRow>> {
        let all: Vec<Instrument> = instruments::list_with_departments(&self.conn())?
            .into_iter()
            .map(|entry| entry.instrument)
            .collect();
        Ok(report::calibration_report(&all, today))
    }
}
