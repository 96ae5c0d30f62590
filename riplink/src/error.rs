//! Error types for riplink
//!
//! [`ProcessError`] is what the reconciliation stages return; its
//! [`ErrorClass`] decides whether a caller treats it as a failure, as
//! "nothing to do", or as a reason to raise a notification.
//! [`ApiError`] maps both onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a stage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Track count still wrong after a rebuild attempt
    DataLoss,
    /// Throttled; nothing to do this time
    ResourceExhausted,
    /// Bad request or record unknown to the catalog
    InvalidArgument,
    NotFound,
    /// Record permanently gone
    OutOfRange,
    Internal,
}

/// Errors from track-set construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackSetError {
    #[error("Release {0} has no formats")]
    NoFormats(i32),

    #[error("Release {0} has an empty tracklist")]
    EmptyTracklist(i32),
}

/// Errors from the reconciliation and link stages
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Physical track count does not match the catalog after a rebuild
    #[error("Track count mismatch for record {record_id}: found {found} of {expected} files")]
    DataLoss {
        record_id: i32,
        found: usize,
        expected: usize,
    },

    /// Processed too recently to run again without force
    #[error("Record {record_id} was processed {elapsed_hours}h ago; skipping")]
    Throttled { record_id: i32, elapsed_hours: i64 },

    /// Catalog does not know this record
    #[error("Record not found: {0}")]
    RecordNotFound(i32),

    /// Catalog rejected the lookup arguments
    #[error("Invalid record request: {0}")]
    InvalidArgument(String),

    /// Record was deleted from the catalog for good
    #[error("Record {0} is gone")]
    RecordGone(i32),

    /// Expected rip source file is absent
    #[error("Missing track: {path}")]
    MissingTrack { path: PathBuf },

    /// No rip directory was found for the release
    #[error("Unable to locate rip for {0}")]
    RipNotFound(i32),

    #[error("Invalid release: {0}")]
    InvalidRelease(#[from] TrackSetError),

    /// Rip directory name does not follow `<id>` or `<id>_<disk>`
    #[error("Unable to convert rip directory name {name}: {reason}")]
    BadRipName { name: String, reason: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("Command dispatch error: {0}")]
    Command(String),

    #[error("Conversion queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Common error: {0}")]
    Common(#[from] riplink_common::Error),
}

impl ProcessError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProcessError::DataLoss { .. } => ErrorClass::DataLoss,
            ProcessError::Throttled { .. } => ErrorClass::ResourceExhausted,
            ProcessError::RecordNotFound(_) => ErrorClass::NotFound,
            ProcessError::InvalidArgument(_) | ProcessError::InvalidRelease(_) => {
                ErrorClass::InvalidArgument
            }
            ProcessError::RecordGone(_) => ErrorClass::OutOfRange,
            _ => ErrorClass::Internal,
        }
    }

    /// Throttling and permanently-gone records count as success
    pub fn is_benign(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::ResourceExhausted | ErrorClass::OutOfRange
        )
    }
}

/// Result type for the processing stages
pub type ProcessResult<T> = Result<T, ProcessError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request path (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Stage failure carrying its classification
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Process(err) => match err.class() {
                ErrorClass::DataLoss => (StatusCode::CONFLICT, "DATA_LOSS"),
                ErrorClass::ResourceExhausted => {
                    (StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED")
                }
                ErrorClass::InvalidArgument => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
                ErrorClass::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ErrorClass::OutOfRange => (StatusCode::GONE, "OUT_OF_RANGE"),
                ErrorClass::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
