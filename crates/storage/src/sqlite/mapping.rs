use quiz_core::SubmitTrigger;
use quiz_core::model::{AnswerRecord, AnswerValue, AttemptId, QuestionId, SubmissionSummary};
use sqlx::Row;

use crate::repository::{StorageError, SubmissionRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Splits an answer into its `(kind, answer)` columns.
pub(crate) fn answer_columns(value: &AnswerValue) -> (&'static str, String) {
    match value {
        AnswerValue::Choice(c) => ("choice", c.to_string()),
        AnswerValue::Text(t) => ("text", t.clone()),
    }
}

fn answer_from_columns(kind: &str, answer: String) -> Result<AnswerValue, StorageError> {
    match kind {
        "choice" => {
            let mut chars = answer.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(AnswerValue::Choice(c)),
                _ => Err(StorageError::Serialization(format!(
                    "invalid choice answer: {answer}"
                ))),
            }
        }
        "text" => Ok(AnswerValue::Text(answer)),
        other => Err(StorageError::Serialization(format!(
            "unknown answer kind: {other}"
        ))),
    }
}

pub(crate) fn trigger_to_str(trigger: SubmitTrigger) -> &'static str {
    match trigger {
        SubmitTrigger::Manual => "manual",
        SubmitTrigger::TimeUp => "time_up",
    }
}

fn parse_trigger(s: &str) -> Result<SubmitTrigger, StorageError> {
    match s {
        "manual" => Ok(SubmitTrigger::Manual),
        "time_up" => Ok(SubmitTrigger::TimeUp),
        other => Err(StorageError::Serialization(format!(
            "unknown submit trigger: {other}"
        ))),
    }
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerRecord, StorageError> {
    let question_id = i64_to_u64("question_id", row.try_get("question_id").map_err(ser)?)?;
    let kind: String = row.try_get("kind").map_err(ser)?;
    let answer: String = row.try_get("answer").map_err(ser)?;
    Ok(AnswerRecord::new(
        QuestionId::new(question_id),
        answer_from_columns(&kind, answer)?,
    ))
}

pub(crate) fn map_submission_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SubmissionRecord, StorageError> {
    let attempt_id = i64_to_u64("attempt_id", row.try_get("attempt_id").map_err(ser)?)?;
    let score: f64 = row.try_get("score").map_err(ser)?;
    let correct = u32_from_i64("correct", row.try_get("correct").map_err(ser)?)?;
    let total = u32_from_i64("total", row.try_get("total").map_err(ser)?)?;
    let trigger: String = row.try_get("submit_trigger").map_err(ser)?;
    let submitted_at = row.try_get("submitted_at").map_err(ser)?;

    Ok(SubmissionRecord {
        summary: SubmissionSummary {
            attempt_id: AttemptId::new(attempt_id),
            score,
            correct,
            total,
        },
        trigger: parse_trigger(&trigger)?,
        submitted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_columns_round_trip_single_letter_text() {
        let value = AnswerValue::Text("x".into());
        let (kind, raw) = answer_columns(&value);
        assert_eq!(answer_from_columns(kind, raw).unwrap(), value);
    }

    #[test]
    fn rejects_unknown_kind_and_trigger() {
        assert!(answer_from_columns("essay", "x".into()).is_err());
        assert!(answer_from_columns("choice", "AB".into()).is_err());
        assert!(parse_trigger("auto").is_err());
        assert_eq!(
            parse_trigger(trigger_to_str(SubmitTrigger::TimeUp)).unwrap(),
            SubmitTrigger::TimeUp
        );
    }
}
