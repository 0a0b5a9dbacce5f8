mod runner;
mod service;

pub use runner::{QuizEvent, QuizRunner};
pub use service::QuizService;
