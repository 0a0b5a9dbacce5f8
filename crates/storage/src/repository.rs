use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::SubmitTrigger;
use quiz_core::model::{AnswerRecord, AttemptId, SubmissionSummary};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A finished submission as acknowledged by the API.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub summary: SubmissionSummary,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
}

/// Holds answer values between the moment a student answers and submission.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Store or replace the answer for one question of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the answer cannot be stored.
    async fn save_answer(
        &self,
        attempt_id: AttemptId,
        record: &AnswerRecord,
    ) -> Result<(), StorageError>;

    /// All answers of an attempt, in the order questions were first answered.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. An unknown attempt yields an empty list.
    async fn answers(&self, attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError>;

    /// Drop every stored answer for an attempt and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear(&self, attempt_id: AttemptId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the attempt already has a submission.
    async fn record_submission(&self, record: &SubmissionRecord) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt was never submitted.
    async fn get_submission(&self, attempt_id: AttemptId)
    -> Result<SubmissionRecord, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    answers: Arc<Mutex<HashMap<AttemptId, Vec<AnswerRecord>>>>,
    submissions: Arc<Mutex<HashMap<AttemptId, SubmissionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn save_answer(
        &self,
        attempt_id: AttemptId,
        record: &AnswerRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .answers
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let entries = guard.entry(attempt_id).or_default();
        match entries
            .iter_mut()
            .find(|existing| existing.question_id == record.question_id)
        {
            Some(existing) => existing.value = record.value.clone(),
            None => entries.push(record.clone()),
        }
        Ok(())
    }

    async fn answers(&self, attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        let guard = self
            .answers
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&attempt_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, attempt_id: AttemptId) -> Result<u64, StorageError> {
        let mut guard = self
            .answers
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let removed = guard.remove(&attempt_id).map_or(0, |v| v.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn record_submission(&self, record: &SubmissionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let attempt_id = record.summary.attempt_id;
        if guard.contains_key(&attempt_id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(attempt_id, record.clone());
        Ok(())
    }

    async fn get_submission(
        &self,
        attempt_id: AttemptId,
    ) -> Result<SubmissionRecord, StorageError> {
        let guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&attempt_id).cloned().ok_or(StorageError::NotFound)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub answers: Arc<dyn AnswerRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
}
