use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        AbortError, ApplyError, PlanError,
        game::{AnswerError, RejectReason, SelectionError},
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The participant set cannot seed a session.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    /// Command issued against the wrong lifecycle state.
    #[error("conflicting session: {0}")]
    ConflictingSession(String),
    /// Answer was not recorded.
    #[error("answer rejected: {0}")]
    AnswerRejected(RejectReason),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// The command worker is no longer running.
    #[error("game engine is shutting down")]
    Shutdown,
}

impl ServiceError {
    /// Whether the failure comes from the persistence layer.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable(_) | ServiceError::Degraded | ServiceError::Timeout
        )
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SelectionError> for ServiceError {
    fn from(err: SelectionError) -> Self {
        ServiceError::InvalidSelection(err.to_string())
    }
}

impl From<AnswerError> for ServiceError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::NotSeated(id) => {
                ServiceError::NotFound(format!("participant `{id}` is not seated in the session"))
            }
            AnswerError::Rejected(reason) => ServiceError::AnswerRejected(reason),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidSelection(message) => AppError::BadRequest(message),
            ServiceError::ConflictingSession(message) => AppError::Conflict(message),
            ServiceError::AnswerRejected(reason) => AppError::Conflict(reason.to_string()),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Shutdown => AppError::ServiceUnavailable("shutting down".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::ConflictingSession("state transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::ConflictingSession(invalid.to_string())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => {
                ServiceError::ConflictingSession("no transition is pending".into())
            }
            ApplyError::IdMismatch { .. } => {
                ServiceError::ConflictingSession("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => {
                ServiceError::ConflictingSession(format!(
                    "state changed during transition (expected {expected:?}, got {actual:?})"
                ))
            }
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::ConflictingSession(format!(
                    "state version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => {
                ServiceError::ConflictingSession("no pending transition".into())
            }
            AbortError::IdMismatch { .. } => {
                ServiceError::ConflictingSession("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn domain_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(ServiceError::InvalidSelection("two ids".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::ConflictingSession("active".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::AnswerRejected(RejectReason::Late)),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(ServiceError::Shutdown), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(ServiceError::NotFound("session".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn persistence_failures_are_flagged() {
        assert!(ServiceError::Timeout.is_persistence_failure());
        assert!(ServiceError::Degraded.is_persistence_failure());
        assert!(!ServiceError::AnswerRejected(RejectReason::Duplicate).is_persistence_failure());
    }
}
