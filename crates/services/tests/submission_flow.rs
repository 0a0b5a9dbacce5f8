mod support;

use std::sync::Arc;

use quiz_core::model::{AnswerRecord, AnswerValue, AttemptId, QuestionId, QuizAttempt};
use quiz_core::time::fixed_now;
use quiz_core::{QuizSession, SubmitTrigger};
use services::{AttemptSubmitter, HttpTransport, ResilientClient, SubmissionService};
use storage::repository::{AnswerRepository, InMemoryRepository, SubmissionRepository};
use support::{ScriptedTransport, json, status};

fn attempt() -> QuizAttempt {
    QuizAttempt::new(
        AttemptId::new(21),
        vec![QuestionId::new(1), QuestionId::new(2)],
        120,
    )
    .unwrap()
}

fn service(transport: &Arc<ScriptedTransport>, repo: &InMemoryRepository) -> SubmissionService {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    SubmissionService::new(
        ResilientClient::new(transport, "/api/auth/refresh"),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

#[tokio::test]
async fn submits_stored_answers_after_refresh() {
    let repo = InMemoryRepository::new();
    let attempt = attempt();
    let mut session = QuizSession::start(&attempt, fixed_now()).unwrap();
    session.record_answer(QuestionId::new(2)).unwrap();
    repo.save_answer(
        attempt.id(),
        &AnswerRecord::new(QuestionId::new(2), AnswerValue::Choice('B')),
    )
    .await
    .unwrap();
    let ticket = session.submit(SubmitTrigger::Manual, fixed_now()).unwrap();

    let transport = ScriptedTransport::new(vec![
        status(401),
        status(200),
        json(200, r#"{"attemptId":21,"score":50.0,"correct":1,"total":2}"#),
    ]);
    let summary = service(&transport, &repo).submit(&ticket).await.unwrap();

    assert_eq!(summary.correct, 1);
    assert_eq!(
        transport.paths(),
        vec![
            "/api/test-attempts/21/submit",
            "/api/auth/refresh",
            "/api/test-attempts/21/submit",
        ]
    );
    let body = transport.seen()[2].body.clone().unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "answers": [{ "questionId": 2, "answer": "B" }],
            "trigger": "manual",
            "elapsedSeconds": 0
        })
    );

    let recorded = repo.get_submission(attempt.id()).await.unwrap();
    assert_eq!(recorded.summary, summary);
    assert_eq!(recorded.trigger, SubmitTrigger::Manual);
}

#[tokio::test]
async fn expired_credentials_surface_as_auth_expired() {
    let repo = InMemoryRepository::new();
    let attempt = attempt();
    let mut session = QuizSession::start(&attempt, fixed_now()).unwrap();
    let ticket = session.submit(SubmitTrigger::TimeUp, fixed_now()).unwrap();

    let transport = ScriptedTransport::new(vec![status(401), status(401)]);
    let err = service(&transport, &repo).submit(&ticket).await.unwrap_err();

    assert!(err.is_auth_expired());
    assert_eq!(transport.calls(), 2);
    assert!(repo.get_submission(attempt.id()).await.is_err());
}
