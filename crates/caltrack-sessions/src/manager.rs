use std::sync::{Mutex, MutexGuard, PoisonError};

use caltrack_core::types::UserId;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::{new_token, Session};

/// Thread-safe manager for persisted login sessions.
///
/// Wraps a single SQLite connection in a `Mutex`, sufficient for a
/// single-node deployment.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    /// Wrap an already-open connection, creating the table if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session for `user_id` lasting `ttl` from `now`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn create(&self, user_id: &UserId, ttl: Duration, now: DateTime<Utc>) -> Result<Session> {
        if ttl <= Duration::zero() {
            return Err(SessionError::InvalidTtl(format!("{ttl}")));
        }
        // Stored at second precision; keep the returned value identical.
        let now = now.trunc_subsecs(0);
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| SessionError::InvalidTtl(format!("{ttl} overflows the calendar")))?;
        let session = Session {
            id: Uuid::now_v7().to_string(),
            token: new_token(),
            user_id: user_id.clone(),
            created_at: now,
            expires_at,
        };
        self.conn().execute(
            "INSERT INTO sessions (id, token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.token,
                session.user_id.as_str(),
                timestamp(session.created_at),
                timestamp(session.expires_at),
            ],
        )?;
        debug!(session_id = %session.id, expires_at = %session.expires_at, "session created");
        Ok(session)
    }

    /// Look up a live session by token. An expired session is deleted and
    /// reported as absent.
    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let db = self.conn();
        let found = db
            .query_row(
                "SELECT id, token, user_id, created_at, expires_at
                 FROM sessions WHERE token = ?1",
                params![token],
                row_to_raw,
            )
            .optional()?;
        let Some(raw) = found else {
            return Ok(None);
        };
        let session = raw.into_session()?;
        if session.is_expired(now) {
            db.execute("DELETE FROM sessions WHERE id = ?1", params![session.id])?;
            debug!(session_id = %session.id, "expired session removed");
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Delete the session holding `token`. Returns whether one existed.
    #[instrument(skip(self, token))]
    pub fn revoke(&self, token: &str) -> Result<bool> {
        let n = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(n > 0)
    }

    /// Remove every session that has expired as of `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let n = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![timestamp(now)],
        )?;
        if n > 0 {
            info!(count = n, "expired sessions purged");
        }
        Ok(n)
    }
}

/// Fixed-width UTC form so string comparison in SQL orders correctly.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct RawSession {
    id: String,
    token: String,
    user_id: String,
    created_at: String,
    expires_at: String,
}

impl RawSession {
    fn into_session(self) -> Result<Session> {
        let parse = |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| SessionError::Corrupt {
                    id: self.id.clone(),
                    reason: e.to_string(),
                })
        };
        let created_at = parse(&self.created_at)?;
        let expires_at = parse(&self.expires_at)?;
        Ok(Session {
            id: self.id,
            token: self.token,
            user_id: UserId::from(self.user_id),
            created_at,
            expires_at,
        })
    }
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        id: row.get(0)?,
        token: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
    })
}
