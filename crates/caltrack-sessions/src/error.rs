use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored timestamp could not be parsed.
    #[error("corrupt session row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("invalid session ttl: {0}")]
    InvalidTtl(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
