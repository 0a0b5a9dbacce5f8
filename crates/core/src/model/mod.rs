mod answer;
mod attempt;
mod ids;

pub use answer::{AnswerError, AnswerRecord, AnswerValue};
pub use attempt::{AttemptError, QuizAttempt, SubmissionSummary};
pub use ids::{AttemptId, QuestionId};
