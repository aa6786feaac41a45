use caltrack_core::types::UserRole;
use rusqlite::{Connection, Result};

use crate::types::User;

/// Column order shared by every SELECT in this crate.
pub(crate) const USER_COLUMNS: &str =
    "id, username, email, role, department, created_at, updated_at";

/// Map a SELECT row (column order from USER_COLUMNS) to a User.
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    use std::str::FromStr;
    let role = UserRole::from_str(&row.get::<_, String>(3)?).unwrap_or_default();
    Ok(User {
        id: row.get::<_, String>(0)?.into(),
        username: row.get(1)?,
        email: row.get(2)?,
        role,
        department: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Initialise the users table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    // Usernames and emails are matched case-insensitively.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id             TEXT PRIMARY KEY NOT NULL,
            username       TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email          TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash  TEXT NOT NULL,
            role           TEXT NOT NULL DEFAULT 'user',
            department     TEXT,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );",
    )
}
