// src/web/types.rs
//! Request/response DTOs and the JSON error envelope for the API surface.

use chrono::{DateTime, Utc};
use rocket::form::FromForm;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Request, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{Answer, InterviewSession, Question};

// ===== Requests =====

#[derive(Deserialize)]
pub struct CreateCandidateRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct StartInterviewRequest {
    pub candidate_id: Uuid,
    pub role: Option<String>,
    pub difficulty_mix: Option<String>,
}

#[derive(Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    pub text: String,
    #[serde(default)]
    pub auto_submitted: bool,
}

#[derive(Deserialize)]
pub struct ExpireRequest {
    pub draft_text: Option<String>,
}

#[derive(FromForm)]
pub struct ResumeUploadForm<'f> {
    pub file: TempFile<'f>,
}

// ===== Responses =====

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub status: String,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub remaining_seconds: u32,
    pub progress_percent: u32,
    pub total_time_seconds: u64,
    pub final_score: Option<f64>,
    pub summary: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionResponse {
    pub fn from_session(session: &InterviewSession, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id,
            candidate_id: session.candidate_id,
            status: session.status.as_str().to_string(),
            current_question_index: session.current_question_index,
            total_questions: session.questions.len(),
            remaining_seconds: session.remaining_seconds(now),
            progress_percent: session.progress_percent(),
            total_time_seconds: session.total_time_seconds(),
            final_score: session.final_score,
            summary: session.summary.clone(),
            started_at: session.started_at,
            completed_at: session.completed_at,
        }
    }
}

#[derive(Serialize)]
pub struct CurrentQuestionResponse {
    pub question: Question,
    pub current_index: usize,
    pub total_questions: usize,
    pub remaining_seconds: u32,
    pub progress_percent: u32,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub status: String,
    pub progress_percent: u32,
    pub current_question: usize,
    pub total_questions: usize,
    pub answered_questions: usize,
    pub total_time_seconds: u64,
    pub remaining_seconds: u32,
}

#[derive(Serialize)]
pub struct HistoryEntry {
    pub question_number: usize,
    pub question: Question,
    pub answer: Option<Answer>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session: SessionResponse,
    pub history: Vec<HistoryEntry>,
    pub average_score: Option<f64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ===== Error envelope =====

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}

/// Typed failure carried out of a handler: HTTP status plus the JSON
/// envelope.
pub struct ApiError {
    pub status: Status,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: Status, error: String, error_code: &str, suggestions: Vec<String>) -> Self {
        Self {
            status,
            body: ErrorResponse::new(error, error_code.to_string(), suggestions),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let suggestions = match &err {
            SessionError::InvalidState(status) => vec![format!(
                "The session is {}; check its state before retrying",
                status
            )],
            SessionError::AlreadyOpen => vec![
                "Complete or abandon the open session first".to_string(),
            ],
            SessionError::QuestionMismatch { expected, .. } => vec![format!(
                "Submit the answer for the current question ({})",
                expected
            )],
            SessionError::TimerStillRunning => vec![
                "Wait for the question timer to reach zero".to_string(),
            ],
            SessionError::DuplicateEmail(_) => vec![
                "Use a different email address".to_string(),
                "Look up the existing candidate instead".to_string(),
            ],
            SessionError::NotFound { .. } => vec!["Check the identifier".to_string()],
            SessionError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                vec!["Try again in a few moments".to_string()]
            }
        };

        let message = match &err {
            // Internal details stay in the logs.
            SessionError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        ApiError::new(err.status(), message, err.code(), suggestions)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let body = Json(self.body).respond_to(request)?;
        Response::build_from(body).status(self.status).ok()
    }
}
