use thiserror::Error;

use crate::model::{AnswerError, AttemptError};
use crate::navigation::NavigationError;
use crate::session::SessionError;

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
