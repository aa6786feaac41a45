use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db::{clean, date_column, date_to_sql, opt_date_column};
use crate::error::{RegistryError, Result};
use crate::instruments::get_instrument;
use crate::money::Money;
use crate::types::{
    InstrumentStatus, NewRepair, Repair, RepairListing, RepairQuery, RepairStatus, RepairType,
};

const REPAIR_COLUMNS: &str = "r.id, r.instrument_id, r.repair_type, r.description, r.cost_cents,
     r.technician, r.start_date, r.completion_date, r.status, r.notes, r.created_at";

fn row_to_repair(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repair> {
    use std::str::FromStr;
    let repair_type = RepairType::from_str(&row.get::<_, String>(2)?).unwrap_or_default();
    let status = RepairStatus::from_str(&row.get::<_, String>(8)?).unwrap_or_default();
    Ok(Repair {
        id: row.get(0)?,
        instrument_id: row.get(1)?,
        repair_type,
        description: row.get(3)?,
        cost: row.get::<_, Option<i64>>(4)?.map(Money::from_cents),
        technician: row.get(5)?,
        start_date: date_column(row, 6)?,
        completion_date: opt_date_column(row, 7)?,
        status,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Repairs matching `query`, most recently started first.
pub fn list_repairs(conn: &Connection, query: &RepairQuery) -> Result<Vec<RepairListing>> {
    let search = clean(&query.search).map(|s| format!("%{}%", escape_like(&s)));
    let status = query.status.map(|s| s.to_string());

    let mut stmt = conn.prepare(&format!(
        "SELECT {REPAIR_COLUMNS}, i.name
         FROM repairs r
         JOIN instruments i ON i.id = r.instrument_id
         WHERE (?1 IS NULL
                OR i.name LIKE ?1 ESCAPE '\\'
                OR r.description LIKE ?1 ESCAPE '\\'
                OR IFNULL(r.technician, '') LIKE ?1 ESCAPE '\\')
           AND (?2 IS NULL OR r.status = ?2)
         ORDER BY r.start_date DESC, r.id DESC"
    ))?;
    let rows = stmt.query_map(params![search, status], |row| {
        Ok(RepairListing {
            repair: row_to_repair(row)?,
            instrument_name: row.get(11)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Make `%`, `_` and the escape character itself match literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn get_repair(conn: &Connection, id: i64) -> Result<Option<Repair>> {
    Ok(conn
        .query_row(
            &format!("SELECT {REPAIR_COLUMNS} FROM repairs r WHERE r.id = ?1"),
            params![id],
            row_to_repair,
        )
        .optional()?)
}

/// Open a repair record. `today` fills in a missing start date.
pub fn create_repair(conn: &Connection, new: &NewRepair, today: NaiveDate) -> Result<Repair> {
    let description = new.description.trim();
    if description.is_empty() {
        return Err(RegistryError::Validation("repair description is required".to_string()));
    }
    if get_instrument(conn, new.instrument_id)?.is_none() {
        return Err(RegistryError::Validation(format!(
            "unknown instrument: {}",
            new.instrument_id
        )));
    }
    if new.cost.is_some_and(|c| c.cents() < 0) {
        return Err(RegistryError::Validation("repair cost cannot be negative".to_string()));
    }

    let start_date = new.start_date.unwrap_or(today);
    conn.execute(
        "INSERT INTO repairs
            (instrument_id, repair_type, description, cost_cents, technician,
             start_date, completion_date, status, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)",
        params![
            new.instrument_id,
            new.repair_type.to_string(),
            description,
            new.cost.map(Money::cents),
            clean(&new.technician),
            date_to_sql(start_date),
            RepairStatus::InProgress.to_string(),
            clean(&new.notes),
            Utc::now().to_rfc3339(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(repair_id = id, instrument_id = new.instrument_id, "repair opened");
    get_repair(conn, id)?.ok_or_else(|| RegistryError::not_found("repair", id))
}

/// Mark a repair completed on `completed_on`.
///
/// When the owning instrument is flagged `repair` it goes back to `active`.
/// Both updates share one transaction so the instrument can never stay
/// flagged under repair without an open repair record.
pub fn complete_repair(conn: &Connection, id: i64, completed_on: NaiveDate) -> Result<Repair> {
    let tx = conn.unchecked_transaction()?;

    let instrument_id: i64 = tx
        .query_row(
            "SELECT instrument_id FROM repairs WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RegistryError::not_found("repair", id))?;

    tx.execute(
        "UPDATE repairs SET status = ?2, completion_date = ?3 WHERE id = ?1",
        params![id, RepairStatus::Completed.to_string(), date_to_sql(completed_on)],
    )?;
    let reactivated = tx.execute(
        "UPDATE instruments SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        params![
            instrument_id,
            InstrumentStatus::Active.to_string(),
            Utc::now().to_rfc3339(),
            InstrumentStatus::Repair.to_string(),
        ],
    )?;
    tx.commit()?;

    info!(repair_id = id, instrument_id, reactivated = reactivated > 0, "repair completed");
    get_repair(conn, id)?.ok_or_else(|| RegistryError::not_found("repair", id))
}

pub fn count_in_progress(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM repairs WHERE status = ?1",
        params![RepairStatus::InProgress.to_string()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}
