#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod navigation;
pub mod session;
pub mod time;
pub mod timer;

pub use error::Error;
pub use navigation::{NavigationError, QuizNavigator, SlotState};
pub use session::{
    QuizSession, SessionError, SessionSnapshot, SessionState, SessionTick, SubmissionTicket,
    SubmitTrigger,
};
pub use time::Clock;
pub use timer::{CountdownTimer, ResetKey, TickEvent, TickToken, format_time};
