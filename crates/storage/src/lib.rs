#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AnswerRepository, InMemoryRepository, Storage, StorageError, SubmissionRecord,
    SubmissionRepository,
};
