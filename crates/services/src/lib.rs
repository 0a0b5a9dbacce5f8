#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http;
pub mod quiz;
pub mod submission;

pub use quiz_core::Clock;

pub use config::ApiConfig;
pub use error::{FetchError, QuizError, SubmissionError, TransportError};
pub use http::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, ResilientClient};
pub use quiz::{QuizEvent, QuizRunner, QuizService};
pub use submission::{AttemptSubmitter, SubmissionService};
