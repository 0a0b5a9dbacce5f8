use quiz_core::model::AttemptId;

use super::{
    SqliteRepository,
    mapping::{id_i64, map_submission_row, trigger_to_str},
};
use crate::repository::{StorageError, SubmissionRecord, SubmissionRepository};

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn record_submission(&self, record: &SubmissionRecord) -> Result<(), StorageError> {
        let attempt = id_i64("attempt_id", record.summary.attempt_id.value())?;

        let res = sqlx::query(
            r"
                INSERT INTO submissions (attempt_id, score, correct, total, submit_trigger, submitted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(attempt_id) DO NOTHING
            ",
        )
        .bind(attempt)
        .bind(record.summary.score)
        .bind(i64::from(record.summary.correct))
        .bind(i64::from(record.summary.total))
        .bind(trigger_to_str(record.trigger))
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn get_submission(
        &self,
        attempt_id: AttemptId,
    ) -> Result<SubmissionRecord, StorageError> {
        let attempt = id_i64("attempt_id", attempt_id.value())?;

        let row = sqlx::query(
            r"
                SELECT attempt_id, score, correct, total, submit_trigger, submitted_at
                FROM submissions
                WHERE attempt_id = ?1
            ",
        )
        .bind(attempt)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_submission_row(&row)
    }
}
