use quiz_core::model::{AnswerRecord, AttemptId};

use super::{
    SqliteRepository,
    mapping::{answer_columns, id_i64, map_answer_row},
};
use crate::repository::{AnswerRepository, StorageError};

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn save_answer(
        &self,
        attempt_id: AttemptId,
        record: &AnswerRecord,
    ) -> Result<(), StorageError> {
        let attempt = id_i64("attempt_id", attempt_id.value())?;
        let question = id_i64("question_id", record.question_id.value())?;
        let (kind, answer) = answer_columns(&record.value);

        // The upsert keeps the original rowid, so first-answered order survives edits.
        sqlx::query(
            r"
                INSERT INTO attempt_answers (attempt_id, question_id, kind, answer)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(attempt_id, question_id)
                DO UPDATE SET kind = excluded.kind, answer = excluded.answer
            ",
        )
        .bind(attempt)
        .bind(question)
        .bind(kind)
        .bind(answer)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn answers(&self, attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        let attempt = id_i64("attempt_id", attempt_id.value())?;

        let rows = sqlx::query(
            r"
                SELECT question_id, kind, answer
                FROM attempt_answers
                WHERE attempt_id = ?1
                ORDER BY rowid ASC
            ",
        )
        .bind(attempt)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }

    async fn clear(&self, attempt_id: AttemptId) -> Result<u64, StorageError> {
        let attempt = id_i64("attempt_id", attempt_id.value())?;
        let res = sqlx::query("DELETE FROM attempt_answers WHERE attempt_id = ?1")
            .bind(attempt)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected())
    }
}
