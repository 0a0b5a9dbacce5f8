#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::SubmissionTicket;
use quiz_core::model::{AnswerRecord, AttemptId, SubmissionSummary};
use reqwest::StatusCode;
use services::error::SubmissionError;
use services::{ApiRequest, ApiResponse, AttemptSubmitter, HttpTransport, TransportError};
use storage::repository::{AnswerRepository, StorageError};

/// Transport that replays canned outcomes and records every request it saw.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    seen: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<ApiResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<ApiRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.seen().into_iter().map(|r| r.path).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".into())))
    }
}

pub fn status(code: u16) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(StatusCode::from_u16(code).unwrap(), ""))
}

pub fn json(code: u16, body: &str) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(StatusCode::from_u16(code).unwrap(), body))
}

/// Submitter that counts calls and keeps every ticket it received.
#[derive(Default)]
pub struct CountingSubmitter {
    calls: AtomicUsize,
    finished: AtomicUsize,
    tickets: Mutex<Vec<SubmissionTicket>>,
    fail_first: AtomicUsize,
    delay: Duration,
}

impl CountingSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` calls with a transport error.
    pub fn failing(n: usize) -> Arc<Self> {
        let submitter = Self::default();
        submitter.fail_first.store(n, Ordering::SeqCst);
        Arc::new(submitter)
    }

    /// Take `delay` to answer every call.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion, successful or not.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn tickets(&self) -> Vec<SubmissionTicket> {
        self.tickets.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttemptSubmitter for CountingSubmitter {
    async fn submit(
        &self,
        ticket: &SubmissionTicket,
    ) -> Result<SubmissionSummary, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tickets.lock().unwrap().push(ticket.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(SubmissionError::Fetch(services::FetchError::Transport(
                TransportError::Connection("offline".into()),
            )));
        }
        let total = u32::try_from(ticket.answered.len()).unwrap();
        Ok(SubmissionSummary {
            attempt_id: ticket.attempt_id,
            score: 100.0,
            correct: total,
            total,
        })
    }
}

/// Answer store whose writes always fail.
#[derive(Default)]
pub struct BrokenAnswers;

#[async_trait]
impl AnswerRepository for BrokenAnswers {
    async fn save_answer(
        &self,
        _attempt_id: AttemptId,
        _record: &AnswerRecord,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }

    async fn answers(&self, _attempt_id: AttemptId) -> Result<Vec<AnswerRecord>, StorageError> {
        Ok(Vec::new())
    }

    async fn clear(&self, _attempt_id: AttemptId) -> Result<u64, StorageError> {
        Ok(0)
    }
}
