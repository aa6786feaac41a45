use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions table and its index.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            token       TEXT NOT NULL UNIQUE,
            user_id     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_expiry
            ON sessions(expires_at);",
    )?;
    Ok(())
}
