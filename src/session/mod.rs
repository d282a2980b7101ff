// src/session/mod.rs
//! The interview session core: question/answer records, wall-clock timer
//! accounting and the session lifecycle state machine. Everything in this
//! module is pure - operations take `now` as a parameter and perform no I/O.

pub mod model;
pub mod state;
pub mod timer;

pub use model::{Answer, Difficulty, Question, SessionStatus};
pub use state::{InterviewSession, SubmitOutcome};
pub use timer::TimerState;
