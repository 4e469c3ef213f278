use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, phase::PhaseError, phase::configured::DefinitionError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Storage(#[source] StorageError),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Locations required by the target phases are not set and `force` was not given.
    #[error(
        "not all required event locations are set, use `force` to override: {}",
        .0.join(", ")
    )]
    MissingLocations(Vec<String>),
    /// The active group has no phase left to start.
    #[error("no more phases to start")]
    Exhausted,
    /// A phase hook failed after the transition was applied.
    #[error("phase hook failed: {0}")]
    Hook(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<PhaseError> for ServiceError {
    fn from(err: PhaseError) -> Self {
        match err {
            PhaseError::UnknownGroup(_) | PhaseError::UnknownPhase(_) => {
                ServiceError::NotFound(err.to_string())
            }
            PhaseError::NoPhaseGroup
            | PhaseError::UnknownPhaseInGroup { .. }
            | PhaseError::NoCurrentPhase
            | PhaseError::InfiniteDuration(_) => ServiceError::InvalidState(err.to_string()),
            PhaseError::Hook { ref source, .. } => ServiceError::Hook(format!("{err}: {source}")),
            PhaseError::Storage(source) => ServiceError::Storage(source),
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
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ (ServiceError::MissingLocations(_) | ServiceError::Exhausted) => {
                AppError::Conflict(err.to_string())
            }
            ServiceError::Hook(message) => AppError::Internal(message),
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
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

/// Failures while assembling the application state at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The configured event is inconsistent.
    #[error("invalid event definition")]
    Definition(#[from] DefinitionError),
    /// A persisted document could not be read.
    #[error("failed to load persisted state")]
    Storage(#[from] StorageError),
    /// Restoring the saved phase failed.
    #[error("failed to recover phase progress")]
    Recovery(#[source] PhaseError),
}
