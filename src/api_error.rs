//! The externally visible error taxonomy.
//!
//! Every failure of the entity service surfaces as an [`ApiError`]. Internal storage errors
//! are logged here and replaced by a generic message so database details never reach callers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_store::BulkFailure;
use crate::{DataStoreError, SchemaError, ValidationError};

/// Classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself is malformed or invalid.
    BadRequest,
    /// The entity type or record does not exist.
    NotFound,
    /// The request conflicts with stored state.
    Conflict,
    /// Storage failed for reasons the caller cannot fix.
    InternalError,
}

impl ErrorKind {
    /// The HTTP status for this kind.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InternalError => "Internal Server Error",
        }
    }
}

/// An error as reported to callers of the entity service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Per-item failures of a bulk operation.
    pub errors: Vec<BulkFailure>,
}

impl ApiError {
    /// Creates an error without per-item details.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// A [`ErrorKind::BadRequest`] error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// A bulk operation rejected because of the listed items.
    pub fn bulk(message: impl Into<String>, errors: Vec<BulkFailure>) -> Self {
        Self {
            kind: ErrorKind::BadRequest,
            message: message.into(),
            errors,
        }
    }

    /// Maps a storage error raised while operating on `entity`.
    pub fn from_store(entity: &str, err: DataStoreError) -> Self {
        match err {
            DataStoreError::NotFound => Self::new(ErrorKind::NotFound, format!("{} not found", entity)),
            DataStoreError::DuplicateKey(id) => Self::new(
                ErrorKind::Conflict,
                format!("{} with identity {} already exists", entity, id),
            ),
            DataStoreError::IntegrityViolation(detail) => Self::new(ErrorKind::Conflict, detail),
            DataStoreError::Internal(detail) => {
                tracing::error!(entity, %detail, "storage failure");
                Self::new(ErrorKind::InternalError, "internal storage error")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::NotFound(_) => Self::new(ErrorKind::NotFound, err.to_string()),
            other => {
                tracing::error!(error = %other, "schema failure");
                Self::new(ErrorKind::InternalError, "internal schema error")
            }
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Title of the error kind.
    pub error: String,
    /// The error kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Per-item failures, present only for bulk operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BulkFailure>,
}

impl From<ApiError> for ErrorBody {
    fn from(err: ApiError) -> Self {
        Self {
            error: err.kind.title().to_string(),
            kind: err.kind,
            message: err.message,
            errors: err.errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), message = %self.message, "request rejected");
        }
        (status, Json(ErrorBody::from(self))).into_response()
    }
}
