use quiz_core::SubmitTrigger;
use quiz_core::model::{AnswerRecord, AnswerValue, AttemptId, QuestionId, SubmissionSummary};
use quiz_core::time::fixed_now;
use storage::repository::{
    AnswerRepository, StorageError, SubmissionRecord, SubmissionRepository,
};
use storage::sqlite::SqliteRepository;

fn record(q: u64, value: AnswerValue) -> AnswerRecord {
    AnswerRecord::new(QuestionId::new(q), value)
}

#[tokio::test]
async fn sqlite_answers_upsert_and_keep_order() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_answers?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // Idempotent.
    repo.migrate().await.expect("migrate twice");

    let attempt = AttemptId::new(11);
    repo.save_answer(attempt, &record(2, AnswerValue::Choice('A')))
        .await
        .unwrap();
    repo.save_answer(attempt, &record(1, AnswerValue::Text("mitochondria".into())))
        .await
        .unwrap();
    repo.save_answer(attempt, &record(2, AnswerValue::Choice('C')))
        .await
        .unwrap();
    repo.save_answer(AttemptId::new(12), &record(2, AnswerValue::Choice('B')))
        .await
        .unwrap();

    let stored = repo.answers(attempt).await.expect("answers");
    assert_eq!(
        stored,
        vec![
            record(2, AnswerValue::Choice('C')),
            record(1, AnswerValue::Text("mitochondria".into())),
        ]
    );

    assert_eq!(repo.clear(attempt).await.unwrap(), 2);
    assert!(repo.answers(attempt).await.unwrap().is_empty());
    assert_eq!(repo.answers(AttemptId::new(12)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_submission_is_recorded_once() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_submissions?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let rec = SubmissionRecord {
        summary: SubmissionSummary {
            attempt_id: AttemptId::new(3),
            score: 80.0,
            correct: 4,
            total: 5,
        },
        trigger: SubmitTrigger::TimeUp,
        submitted_at: fixed_now(),
    };
    repo.record_submission(&rec).await.expect("record");
    assert!(matches!(
        repo.record_submission(&rec).await,
        Err(StorageError::Conflict)
    ));

    let fetched = repo.get_submission(AttemptId::new(3)).await.expect("get");
    assert_eq!(fetched, rec);
    assert!(matches!(
        repo.get_submission(AttemptId::new(99)).await,
        Err(StorageError::NotFound)
    ));
}
