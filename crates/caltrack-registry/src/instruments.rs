use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::db::{clean, date_to_sql};
use crate::departments::{get_department, row_to_department, DEPARTMENT_COLUMNS};
use crate::error::{RegistryError, Result};
use crate::types::{Instrument, InstrumentStatus, InstrumentUpdate, InstrumentWithDepartment, NewInstrument, DATE_FORMAT};

const INSTRUMENT_COLUMNS: &str = "i.id, i.name, i.serial_number, i.manufacturer, i.model, i.location,
     i.department_id, i.last_calibration_date, i.calibration_frequency, i.notes, i.status,
     i.created_at, i.updated_at";
const INSTRUMENT_COLUMN_COUNT: usize = 13;

/// Map a SELECT row (column order from INSTRUMENT_COLUMNS) to an Instrument.
///
/// An unparseable calibration date is kept as `None` so the instrument
/// still shows up (classified unknown) instead of failing the whole listing.
fn row_to_instrument(row: &rusqlite::Row<'_>) -> rusqlite::Result<Instrument> {
    use std::str::FromStr;
    let id: i64 = row.get(0)?;
    let raw_date: String = row.get(7)?;
    let last_calibration_date = match NaiveDate::parse_from_str(&raw_date, DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(e) => {
            warn!(instrument_id = id, value = %raw_date, error = %e, "stored calibration date is malformed");
            None
        }
    };
    let status = InstrumentStatus::from_str(&row.get::<_, String>(10)?).unwrap_or_default();
    Ok(Instrument {
        id,
        name: row.get(1)?,
        serial_number: row.get(2)?,
        manufacturer: row.get(3)?,
        model: row.get(4)?,
        location: row.get(5)?,
        department_id: row.get(6)?,
        last_calibration_date,
        calibration_frequency: row.get(8)?,
        notes: row.get(9)?,
        status,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn row_to_instrument_with_department(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstrumentWithDepartment> {
    let instrument = row_to_instrument(row)?;
    // LEFT JOIN: department columns are all NULL when unassigned.
    let department = match row.get::<_, Option<i64>>(INSTRUMENT_COLUMN_COUNT)? {
        Some(_) => Some(row_to_department(row, INSTRUMENT_COLUMN_COUNT)?),
        None => None,
    };
    Ok(InstrumentWithDepartment { instrument, department })
}

/// All instruments ordered by name.
pub fn list_instruments(conn: &Connection) -> Result<Vec<Instrument>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INSTRUMENT_COLUMNS} FROM instruments i ORDER BY i.name ASC, i.id ASC"
    ))?;
    let rows = stmt.query_map([], row_to_instrument)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// All instruments with their department, oldest calibration first.
pub fn list_with_departments(conn: &Connection) -> Result<Vec<InstrumentWithDepartment>> {
    let dept_cols = DEPARTMENT_COLUMNS
        .split(", ")
        .map(|c| format!("d.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {INSTRUMENT_COLUMNS}, {dept_cols}
         FROM instruments i
         LEFT JOIN departments d ON d.id = i.department_id
         ORDER BY i.last_calibration_date ASC, i.id ASC"
    ))?;
    let rows = stmt.query_map([], row_to_instrument_with_department)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Returns None instead of an error when absent.
pub fn get_instrument(conn: &Connection, id: i64) -> Result<Option<Instrument>> {
    Ok(conn
        .query_row(
            &format!("SELECT {INSTRUMENT_COLUMNS} FROM instruments i WHERE i.id = ?1"),
            params![id],
            row_to_instrument,
        )
        .optional()?)
}

pub fn create_instrument(conn: &Connection, new: &NewInstrument) -> Result<Instrument> {
    let name = validate(conn, new)?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO instruments
            (name, serial_number, manufacturer, model, location, department_id,
             last_calibration_date, calibration_frequency, notes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            name,
            clean(&new.serial_number),
            clean(&new.manufacturer),
            clean(&new.model),
            clean(&new.location),
            new.department_id,
            date_to_sql(new.last_calibration_date),
            new.calibration_frequency,
            clean(&new.notes),
            InstrumentStatus::Active.to_string(),
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(instrument_id = id, %name, "instrument created");
    get_instrument(conn, id)?.ok_or_else(|| RegistryError::not_found("instrument", id))
}

/// Replace the descriptive fields of an instrument. Status is left alone.
pub fn update_instrument(conn: &Connection, id: i64, update: &InstrumentUpdate) -> Result<Instrument> {
    let name = validate(conn, update)?;
    let n = conn.execute(
        "UPDATE instruments SET
            name = ?2, serial_number = ?3, manufacturer = ?4, model = ?5, location = ?6,
            department_id = ?7, last_calibration_date = ?8, calibration_frequency = ?9,
            notes = ?10, updated_at = ?11
         WHERE id = ?1",
        params![
            id,
            name,
            clean(&update.serial_number),
            clean(&update.manufacturer),
            clean(&update.model),
            clean(&update.location),
            update.department_id,
            date_to_sql(update.last_calibration_date),
            update.calibration_frequency,
            clean(&update.notes),
            Utc::now().to_rfc3339(),
        ],
    )?;
    if n == 0 {
        return Err(RegistryError::not_found("instrument", id));
    }
    info!(instrument_id = id, "instrument updated");
    get_instrument(conn, id)?.ok_or_else(|| RegistryError::not_found("instrument", id))
}

/// Record a calibration performed on `date`.
pub fn calibrate_instrument(conn: &Connection, id: i64, date: NaiveDate) -> Result<()> {
    let n = conn.execute(
        "UPDATE instruments SET last_calibration_date = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, date_to_sql(date), Utc::now().to_rfc3339()],
    )?;
    if n == 0 {
        return Err(RegistryError::not_found("instrument", id));
    }
    info!(instrument_id = id, %date, "instrument calibrated");
    Ok(())
}

pub fn set_instrument_status(conn: &Connection, id: i64, status: InstrumentStatus) -> Result<()> {
    let n = conn.execute(
        "UPDATE instruments SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.to_string(), Utc::now().to_rfc3339()],
    )?;
    if n == 0 {
        return Err(RegistryError::not_found("instrument", id));
    }
    info!(instrument_id = id, %status, "instrument status changed");
    Ok(())
}

/// Delete an instrument together with its repairs and reminders.
pub fn delete_instrument(conn: &Connection, id: i64) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM repairs WHERE instrument_id = ?1", params![id])?;
    tx.execute("DELETE FROM reminders WHERE instrument_id = ?1", params![id])?;
    let n = tx.execute("DELETE FROM instruments WHERE id = ?1", params![id])?;
    if n == 0 {
        return Err(RegistryError::not_found("instrument", id));
    }
    tx.commit()?;
    info!(instrument_id = id, "instrument deleted");
    Ok(())
}

/// Shared intake/edit validation. Returns the trimmed name.
fn validate(conn: &Connection, new: &NewInstrument) -> Result<String> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(RegistryError::Validation("instrument name is required".to_string()));
    }
    if new.calibration_frequency <= 0 {
        return Err(RegistryError::Validation(
            "calibration frequency must be a positive number of days".to_string(),
        ));
    }
    if let Some(dept) = new.department_id {
        if get_department(conn, dept)?.is_none() {
            return Err(RegistryError::Validation(format!("unknown department: {dept}")));
        }
    }
    Ok(name.to_string())
}
