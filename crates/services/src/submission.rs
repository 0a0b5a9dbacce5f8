use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{AnswerRecord, SubmissionSummary};
use quiz_core::{SubmissionTicket, SubmitTrigger};
use serde::Serialize;
use storage::repository::{
    AnswerRepository, StorageError, SubmissionRecord, SubmissionRepository,
};
use tracing::{info, warn};

use crate::error::{FetchError, SubmissionError};
use crate::http::{ApiRequest, ResilientClient};

/// Hands a finished attempt to whoever grades it.
#[async_trait]
pub trait AttemptSubmitter: Send + Sync {
    /// # Errors
    ///
    /// Returns `SubmissionError` when answers cannot be loaded or the API call fails.
    async fn submit(&self, ticket: &SubmissionTicket) -> Result<SubmissionSummary, SubmissionError>;
}

/// Posts stored answers to the platform's submission endpoint.
#[derive(Clone)]
pub struct SubmissionService {
    client: ResilientClient,
    answers: Arc<dyn AnswerRepository>,
    submissions: Arc<dyn SubmissionRepository>,
}

impl SubmissionService {
    #[must_use]
    pub fn new(
        client: ResilientClient,
        answers: Arc<dyn AnswerRepository>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            client,
            answers,
            submissions,
        }
    }

    #[must_use]
    pub fn submit_path(ticket: &SubmissionTicket) -> String {
        format!("/api/test-attempts/{}/submit", ticket.attempt_id)
    }
}

#[async_trait]
impl AttemptSubmitter for SubmissionService {
    async fn submit(&self, ticket: &SubmissionTicket) -> Result<SubmissionSummary, SubmissionError> {
        let answers = self.answers.answers(ticket.attempt_id).await?;
        let payload = SubmitRequest {
            answers: &answers,
            trigger: ticket.trigger,
            elapsed_seconds: ticket.elapsed_secs,
        };
        let request = ApiRequest::post(Self::submit_path(ticket))
            .with_json(&payload)
            .map_err(FetchError::from)?;

        let summary: SubmissionSummary = self.client.send_json(&request).await?;
        info!(
            attempt = %ticket.attempt_id,
            score = summary.score,
            answered = answers.len(),
            "attempt submitted"
        );

        let record = SubmissionRecord {
            summary: summary.clone(),
            trigger: ticket.trigger,
            submitted_at: ticket.submitted_at,
        };
        // Already accepted upstream; local bookkeeping failures are only logged.
        match self.submissions.record_submission(&record).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                warn!(attempt = %ticket.attempt_id, "submission already recorded locally");
            }
            Err(err) => {
                warn!(attempt = %ticket.attempt_id, error = %err, "failed to record submission");
            }
        }

        Ok(summary)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    answers: &'a [AnswerRecord],
    trigger: SubmitTrigger,
    elapsed_seconds: u32,
}
