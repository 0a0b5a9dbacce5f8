//! Shared error types for the services crate.

use reqwest::StatusCode;
use thiserror::Error;

use quiz_core::SessionError;
use storage::repository::StorageError;

/// Failures below HTTP semantics: the request never produced a response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("request was cancelled")]
    Cancelled,
    #[error("request timed out")]
    Timeout,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ResilientClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The refresh endpoint refused to issue new credentials.
    #[error("session expired, please log in again")]
    AuthExpired { status: StatusCode },
    #[error("request failed with status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors emitted by `SubmissionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SubmissionError {
    /// True when the student has to log in again before anything else can succeed.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::AuthExpired { .. }))
    }
}

/// Errors emitted by `QuizRunner`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no failed submission to retry")]
    NothingToRetry,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
