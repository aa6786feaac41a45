//! Maps subsystem errors onto HTTP responses.
//!
//! Every error body has the shape `{"error": "...", "code": "NOT_FOUND"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use caltrack_core::CaltrackError;
use caltrack_registry::RegistryError;
use caltrack_reminders::DispatchError;
use caltrack_sessions::SessionError;
use caltrack_users::{Denied, UserError};
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// Handler error. Wraps the workspace error so each response carries its
/// stable `code()`.
#[derive(Debug)]
pub struct ApiError(pub CaltrackError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CaltrackError::Unauthorized => StatusCode::UNAUTHORIZED,
            CaltrackError::Forbidden { .. } => StatusCode::FORBIDDEN,
            CaltrackError::NotFound { .. } => StatusCode::NOT_FOUND,
            CaltrackError::Validation(_) => StatusCode::BAD_REQUEST,
            CaltrackError::Conflict(_) => StatusCode::CONFLICT,
            CaltrackError::Config(_)
            | CaltrackError::Storage(_)
            | CaltrackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ApiError(CaltrackError::NotFound {
            entity,
            id: id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<CaltrackError> for ApiError {
    fn from(e: CaltrackError) -> Self {
        ApiError(e)
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError(match e {
            RegistryError::NotFound { entity, id } => CaltrackError::NotFound {
                entity,
                id: id.to_string(),
            },
            RegistryError::Validation(m) => CaltrackError::Validation(m),
            RegistryError::Conflict(m) => CaltrackError::Conflict(m),
            RegistryError::Database(e) => CaltrackError::Storage(e.to_string()),
        })
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        ApiError(match e {
            UserError::NotFound(id) => CaltrackError::NotFound { entity: "user", id },
            UserError::AlreadyExists(m) => CaltrackError::Conflict(m),
            UserError::Validation(m) => CaltrackError::Validation(m),
            UserError::PasswordHash(m) => CaltrackError::Internal(m),
            UserError::DatabaseError(e) => CaltrackError::Storage(e.to_string()),
        })
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError(match e {
            // only reachable through `auth.session_ttl_hours`
            SessionError::InvalidTtl(m) => CaltrackError::Config(m),
            other => CaltrackError::Storage(other.to_string()),
        })
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError(CaltrackError::Storage(e.to_string()))
    }
}

impl From<Denied> for ApiError {
    fn from(d: Denied) -> Self {
        ApiError(match d {
            Denied::Unauthorized => CaltrackError::Unauthorized,
            Denied::Forbidden { reason } => CaltrackError::Forbidden { reason },
        })
    }
}
