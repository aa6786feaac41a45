use thiserror::Error;

/// Errors from the instrument/department/repair/reminder store.
///
/// Callers match on the variant to tell "not found" from "validation failed"
/// from "storage unavailable" rather than parsing messages.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Input rejected before touching the database.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness rule would be broken (e.g. duplicate department name).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl RegistryError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        RegistryError::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
