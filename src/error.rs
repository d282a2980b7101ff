// src/error.rs
//! Typed failures for the interview session core.
//!
//! State-machine violations surface to the HTTP layer as 4xx rejections;
//! collaborator failures never reach here (they degrade to local fallbacks
//! inside the service); anything else is an internal error that leaves the
//! session untouched.

use rocket::http::Status;
use thiserror::Error;

use crate::session::SessionStatus;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation not valid while session is {0}")]
    InvalidState(SessionStatus),

    #[error("candidate already has an open interview session")]
    AlreadyOpen,

    #[error("expected answer for question {expected}, got {got}")]
    QuestionMismatch { expected: String, got: String },

    #[error("timer has not expired for the current question")]
    TimerStillRunning,

    #[error("candidate with email {0} already exists")]
    DuplicateEmail(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SessionError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable code for the JSON error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidState(_) => "INVALID_STATE",
            Self::AlreadyOpen => "SESSION_ALREADY_OPEN",
            Self::QuestionMismatch { .. } => "QUESTION_MISMATCH",
            Self::TimerStillRunning => "TIMER_STILL_RUNNING",
            Self::DuplicateEmail(_) => "CANDIDATE_EXISTS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidState(_)
            | Self::AlreadyOpen
            | Self::TimerStillRunning
            | Self::DuplicateEmail(_) => Status::Conflict,
            Self::QuestionMismatch { .. } => Status::UnprocessableEntity,
            Self::NotFound { .. } => Status::NotFound,
            Self::Internal(_) => Status::InternalServerError,
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
