use thiserror::Error;

/// Workspace-wide error surfaced at the HTTP and CLI boundary.
///
/// Subsystem crates keep their own error enums; the gateway folds them into
/// this type so every response carries one stable `code()`.
#[derive(Debug, Error)]
pub enum CaltrackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {reason}")]
    Forbidden { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaltrackError {
    /// Short error code string returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            CaltrackError::Config(_) => "CONFIG_ERROR",
            CaltrackError::Unauthorized => "UNAUTHORIZED",
            CaltrackError::Forbidden { .. } => "FORBIDDEN",
            CaltrackError::NotFound { .. } => "NOT_FOUND",
            CaltrackError::Validation(_) => "VALIDATION_FAILED",
            CaltrackError::Conflict(_) => "CONFLICT",
            CaltrackError::Storage(_) => "STORAGE_UNAVAILABLE",
            CaltrackError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CaltrackError>;
