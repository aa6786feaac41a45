use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::db::{date_column, date_to_sql};
use crate::error::Result;
use crate::types::{NewReminder, Reminder};

const REMINDER_COLUMNS: &str =
    "id, instrument_id, reminder_date, reminder_type, email_sent, sent_at, created_at";

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        instrument_id: row.get(1)?,
        reminder_date: date_column(row, 2)?,
        reminder_type: row.get(3)?,
        email_sent: row.get::<_, i32>(4)? != 0,
        sent_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Append a delivered-reminder row. Rows are never updated afterwards.
pub fn insert_reminder(conn: &Connection, new: &NewReminder) -> Result<Reminder> {
    let reminder = Reminder {
        id: 0,
        instrument_id: new.instrument_id,
        reminder_date: new.reminder_date,
        reminder_type: "calibration".to_string(),
        email_sent: true,
        sent_at: Some(new.sent_at.to_rfc3339()),
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO reminders
            (instrument_id, reminder_date, reminder_type, email_sent, sent_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            reminder.instrument_id,
            date_to_sql(reminder.reminder_date),
            reminder.reminder_type,
            reminder.email_sent as i32,
            reminder.sent_at,
            reminder.created_at,
        ],
    )?;
    Ok(Reminder {
        id: conn.last_insert_rowid(),
        ..reminder
    })
}

/// Reminders for one instrument, newest first.
pub fn list_for_instrument(conn: &Connection, instrument_id: i64) -> Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         WHERE instrument_id = ?1
         ORDER BY reminder_date DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![instrument_id], row_to_reminder)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Most recent reminders across all instruments.
pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders ORDER BY id DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit as i64], row_to_reminder)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// True when a sent reminder for `instrument_id` is already dated `date`.
pub fn sent_on(conn: &Connection, instrument_id: i64, date: NaiveDate) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reminders
         WHERE instrument_id = ?1 AND reminder_date = ?2 AND email_sent = 1",
        params![instrument_id, date_to_sql(date)],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}
