use chrono::Utc;
use rusqlite::{params, Connection, Result};
use tracing::info;

/// Departments created on first start so the intake form has choices.
const DEFAULT_DEPARTMENTS: &[(&str, &str)] = &[
    ("Laboratory", "Laboratory equipment"),
    ("Production", "Production line equipment"),
    ("Quality Control", "QC instruments"),
    ("Maintenance", "Maintenance tools"),
];

/// Initialise all registry tables. Safe to call on every startup;
/// CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_departments_table(conn)?;
    create_instruments_table(conn)?;
    create_repairs_table(conn)?;
    create_reminders_table(conn)?;
    Ok(())
}

/// Insert the default departments when the table is empty. Returns the
/// number of rows created.
pub fn seed_default_departments(conn: &Connection) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM departments", [], |r| r.get(0))?;
    if existing > 0 {
        return Ok(0);
    }
    let now = Utc::now().to_rfc3339();
    for (name, description) in DEFAULT_DEPARTMENTS {
        conn.execute(
            "INSERT INTO departments (name, manager_email, description, created_at)
             VALUES (?1, NULL, ?2, ?3)",
            params![name, description, now],
        )?;
    }
    info!(count = DEFAULT_DEPARTMENTS.len(), "default departments seeded");
    Ok(DEFAULT_DEPARTMENTS.len())
}

fn create_departments_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS departments (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            name           TEXT NOT NULL UNIQUE,
            manager_email  TEXT,
            description    TEXT,
            created_at     TEXT NOT NULL
        );",
    )
}

fn create_instruments_table(conn: &Connection) -> Result<()> {
    // department_id is nulled (never cascaded) when a department goes away.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS instruments (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            name                   TEXT NOT NULL,
            serial_number          TEXT,
            manufacturer           TEXT,
            model                  TEXT,
            location               TEXT,
            department_id          INTEGER REFERENCES departments(id) ON DELETE SET NULL,
            last_calibration_date  TEXT NOT NULL,   -- YYYY-MM-DD
            calibration_frequency  INTEGER NOT NULL,
            notes                  TEXT,
            status                 TEXT NOT NULL DEFAULT 'active',
            created_at             TEXT NOT NULL,
            updated_at             TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_instruments_last_calibration
            ON instruments (last_calibration_date);
        CREATE INDEX IF NOT EXISTS idx_instruments_department
            ON instruments (department_id);",
    )
}

fn create_repairs_table(conn: &Connection) -> Result<()> {
    // cost_cents: exact two-decimal amount, see Money.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS repairs (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            instrument_id    INTEGER NOT NULL REFERENCES instruments(id) ON DELETE CASCADE,
            repair_type      TEXT NOT NULL,
            description      TEXT NOT NULL,
            cost_cents       INTEGER,
            technician       TEXT,
            start_date       TEXT NOT NULL,
            completion_date  TEXT,
            status           TEXT NOT NULL DEFAULT 'in_progress',
            notes            TEXT,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_repairs_instrument
            ON repairs (instrument_id);
        CREATE INDEX IF NOT EXISTS idx_repairs_start
            ON repairs (start_date DESC);",
    )
}

fn create_reminders_table(conn: &Connection) -> Result<()> {
    // Append-only log of delivered notifications.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reminders (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            instrument_id  INTEGER NOT NULL REFERENCES instruments(id) ON DELETE CASCADE,
            reminder_date  TEXT NOT NULL,
            reminder_type  TEXT NOT NULL DEFAULT 'calibration',
            email_sent     INTEGER NOT NULL DEFAULT 0,
            sent_at        TEXT,
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reminders_instrument_date
            ON reminders (instrument_id, reminder_date);",
    )
}

/// Read a required `YYYY-MM-DD` column, failing the row on bad data.
pub(crate) fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<chrono::NaiveDate> {
    let raw: String = row.get(idx)?;
    chrono::NaiveDate::parse_from_str(&raw, crate::types::DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read an optional `YYYY-MM-DD` column.
pub(crate) fn opt_date_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<Option<chrono::NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => date_column(row, idx).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn date_to_sql(date: chrono::NaiveDate) -> String {
    date.format(crate::types::DATE_FORMAT).to_string()
}

/// Trim free-text form input; blank becomes NULL.
pub(crate) fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
