use std::fmt;
use std::sync::Arc;

use quiz_core::model::{AnswerValue, AttemptId, QuestionId, QuizAttempt};
use quiz_core::{Clock, SessionError, SessionSnapshot, SlotState};
use services::{
    ApiConfig, HttpTransport, QuizError, QuizEvent, QuizRunner, QuizService, ReqwestTransport,
    ResilientClient, SubmissionService,
};
use storage::repository::{Storage, StorageError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingRequired { flag: &'static str },
    UnknownArg(String),
    InvalidAttemptId { raw: String },
    InvalidQuestions { raw: String },
    InvalidDuration { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingRequired { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidAttemptId { raw } => write!(f, "invalid --attempt-id value: {raw}"),
            ArgsError::InvalidQuestions { raw } => {
                write!(f, "invalid --questions value (expected ids like 1,2,3): {raw}")
            }
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// The refresh endpoint refused to renew credentials.
#[derive(Debug)]
struct SessionExpired;

impl fmt::Display for SessionExpired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("session expired, please log in again")
    }
}

impl std::error::Error for SessionExpired {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- run    --attempt-id <id> --questions <id,id,..> --duration <secs>"
    );
    eprintln!("                             [--base-url <url>] [--db <sqlite_url>] [--cookie <name=value>]...");
    eprintln!("  cargo run -p app -- result --attempt-id <id> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --base-url http://localhost:3000");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_API_BASE_URL, QUIZ_REFRESH_PATH, QUIZ_REQUEST_TIMEOUT_SECS,");
    eprintln!("  QUIZ_DB_URL, QUIZ_COOKIE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Result,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    api: ApiConfig,
    db_url: String,
    attempt_id: Option<AttemptId>,
    questions: Vec<QuestionId>,
    duration_secs: Option<u32>,
    cookies: Vec<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            api: ApiConfig::from_env(),
            db_url: std::env::var("QUIZ_DB_URL")
                .unwrap_or_else(|_| "sqlite:quiz.sqlite3".into()),
            attempt_id: None,
            questions: Vec::new(),
            duration_secs: None,
            cookies: std::env::var("QUIZ_COOKIE").ok().into_iter().collect(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--attempt-id" => {
                    let value = require_value(args, "--attempt-id")?;
                    let id: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidAttemptId { raw: value.clone() })?;
                    parsed.attempt_id = Some(AttemptId::new(id));
                }
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    parsed.questions = parse_question_ids(&value)?;
                }
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    let secs: u32 = value
                        .parse()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .ok_or_else(|| ArgsError::InvalidDuration { raw: value.clone() })?;
                    parsed.duration_secs = Some(secs);
                }
                "--base-url" => {
                    parsed.api.base_url = require_value(args, "--base-url")?;
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = value;
                }
                "--cookie" => {
                    parsed.cookies.push(require_value(args, "--cookie")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        parsed.db_url = normalize_sqlite_url(parsed.db_url);
        Ok(parsed)
    }

    fn attempt_id(&self) -> Result<AttemptId, ArgsError> {
        self.attempt_id.ok_or(ArgsError::MissingRequired {
            flag: "--attempt-id",
        })
    }

    fn attempt(&self) -> Result<QuizAttempt, Box<dyn std::error::Error>> {
        let id = self.attempt_id()?;
        if self.questions.is_empty() {
            return Err(ArgsError::MissingRequired { flag: "--questions" }.into());
        }
        let duration = self
            .duration_secs
            .ok_or(ArgsError::MissingRequired { flag: "--duration" })?;
        Ok(QuizAttempt::new(id, self.questions.clone(), duration)?)
    }
}

fn parse_question_ids(raw: &str) -> Result<Vec<QuestionId>, ArgsError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().map(QuestionId::new))
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ArgsError::InvalidQuestions { raw: raw.to_string() })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── INTERACTIVE INPUT ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Next,
    Previous,
    /// 1-based question number as typed by the student.
    Go(usize),
    Answer(String),
    Pause,
    Resume,
    Submit,
    Retry,
    Status,
    Help,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));
    match word {
        "n" | "next" => Some(Input::Next),
        "p" | "prev" => Some(Input::Previous),
        "g" | "go" => rest.parse().ok().filter(|n| *n > 0).map(Input::Go),
        "a" | "answer" if !rest.is_empty() => Some(Input::Answer(rest.to_string())),
        "pause" => Some(Input::Pause),
        "resume" => Some(Input::Resume),
        "submit" => Some(Input::Submit),
        "retry" => Some(Input::Retry),
        "s" | "status" => Some(Input::Status),
        "h" | "help" | "?" => Some(Input::Help),
        _ => None,
    }
}

fn print_commands() {
    println!("commands: n | p | g <number> | a <answer> | pause | resume | submit | retry | status");
}

fn render(snapshot: &SessionSnapshot) -> String {
    let slots: String = snapshot
        .slots
        .iter()
        .map(|slot| match slot {
            SlotState::Current => '>',
            SlotState::Answered => '*',
            SlotState::Unanswered => '.',
        })
        .collect();
    format!(
        "[{}] question {}/{} (id {})  {}  answered {}  {:?}",
        snapshot.time_label,
        snapshot.current_index + 1,
        snapshot.slots.len(),
        snapshot.current_question,
        slots,
        snapshot.answered_count,
        snapshot.state,
    )
}

/// Applies one line of input. Returns `Ok(true)` once the attempt has been submitted.
async fn handle_input(runner: &QuizRunner, input: Input) -> Result<bool, QuizError> {
    match input {
        Input::Next => runner.next().await?,
        Input::Previous => runner.previous().await?,
        Input::Go(number) => runner.navigate(number - 1).await?,
        Input::Answer(raw) => match AnswerValue::parse(&raw) {
            Ok(value) => {
                let question = runner.answer_current(value).await?;
                println!("answer saved for question {question}");
            }
            Err(err) => println!("{err}"),
        },
        Input::Pause => runner.pause().await?,
        Input::Resume => runner.resume().await?,
        Input::Submit => {
            runner.submit().await?;
            return Ok(true);
        }
        Input::Retry => {
            runner.retry_submission().await?;
            return Ok(true);
        }
        Input::Status => {}
        Input::Help => print_commands(),
    }
    println!("{}", render(&runner.snapshot().await));
    Ok(false)
}

async fn run_attempt(args: &Args, storage: Storage) -> Result<(), Box<dyn std::error::Error>> {
    let attempt = args.attempt()?;

    let transport = ReqwestTransport::new(&args.api)?;
    for cookie in &args.cookies {
        transport.add_cookie(cookie);
    }
    let transport: Arc<dyn HttpTransport> = Arc::new(transport);
    let client = ResilientClient::new(transport, args.api.refresh_path.clone());
    let submitter = Arc::new(SubmissionService::new(
        client,
        Arc::clone(&storage.answers),
        Arc::clone(&storage.submissions),
    ));
    let quiz = QuizService::new(Clock::system(), Arc::clone(&storage.answers), submitter);

    let runner = quiz.start(&attempt).await?;
    let mut events = runner.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_commands();
    println!("{}", render(&runner.snapshot().await));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(done) = report(event) {
                        return done;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return hand_in(&runner, &mut events).await;
                };
                let Some(input) = parse_input(&line) else {
                    print_commands();
                    continue;
                };
                match handle_input(&runner, input).await {
                    // The Submitted event prints the result.
                    Ok(_) => {}
                    Err(QuizError::Submission(err)) if err.is_auth_expired() => {
                        return Err(SessionExpired.into());
                    }
                    Err(err) => println!("{err}"),
                }
            }
        }
    }
}

/// Print one runner event. Returns the exit result once the attempt is over.
fn report(event: QuizEvent) -> Option<Result<(), Box<dyn std::error::Error>>> {
    match event {
        QuizEvent::Tick { seconds_left } if seconds_left % 60 == 0 || seconds_left <= 10 => {
            println!("{} left", quiz_core::format_time(seconds_left));
        }
        QuizEvent::Expired => println!("time is up, answers are locked; submitting"),
        QuizEvent::Submitted { summary, .. } => {
            println!(
                "submitted: {}/{} correct, score {:.1}",
                summary.correct, summary.total, summary.score
            );
            return Some(Ok(()));
        }
        QuizEvent::SubmissionFailed {
            auth_expired: true, ..
        } => return Some(Err(SessionExpired.into())),
        QuizEvent::SubmissionFailed { message, .. } => {
            println!("submission failed: {message} (type `retry`)");
        }
        other => tracing::debug!(?other, "quiz event"),
    }
    None
}

/// Input ended: submit unless the timer already did, then report how that submission went.
async fn hand_in(
    runner: &QuizRunner,
    events: &mut broadcast::Receiver<QuizEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    match runner.submit().await {
        // The outcome is on the event stream either way.
        Ok(_) | Err(QuizError::Submission(_)) => {}
        Err(QuizError::Session(SessionError::SessionClosed)) => runner.finish().await,
        Err(err) => return Err(err.into()),
    }

    let mut failure = None;
    loop {
        match events.try_recv() {
            Ok(QuizEvent::SubmissionFailed {
                auth_expired: false,
                message,
                ..
            }) => failure = Some(message),
            Ok(event) => {
                if let Some(done) = report(event) {
                    return done;
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    match failure {
        Some(message) => Err(format!("submission failed: {message}").into()),
        None => Ok(()),
    }
}

async fn show_result(args: &Args, storage: Storage) -> Result<(), Box<dyn std::error::Error>> {
    let attempt_id = args.attempt_id()?;
    match storage.submissions.get_submission(attempt_id).await {
        Ok(record) => {
            println!(
                "attempt {attempt_id}: {}/{} correct, score {:.1} ({:?}, {})",
                record.summary.correct,
                record.summary.total,
                record.summary.score,
                record.trigger,
                record.submitted_at.to_rfc3339(),
            );
            Ok(())
        }
        Err(StorageError::NotFound) => {
            println!("attempt {attempt_id} has not been submitted from this machine");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => {
            print_usage();
            return Ok(());
        }
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Run => run_attempt(&parsed, storage).await,
        Command::Result => show_result(&parsed, storage).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
