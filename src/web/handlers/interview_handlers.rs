// src/web/handlers/interview_handlers.rs
//! One handler per session operation; each returns the updated session
//! snapshot or the typed error envelope.

use std::sync::Arc;

use chrono::Utc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;
use uuid::Uuid;

use crate::service::InterviewService;
use crate::web::types::{
    ApiError, CurrentQuestionResponse, ExpireRequest, HistoryEntry, HistoryResponse,
    ProgressResponse, SessionResponse, StartInterviewRequest, SubmitAnswerRequest,
};

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::new(
            Status::NotFound,
            format!("session {} not found", raw),
            "NOT_FOUND",
            vec!["Check the session id".to_string()],
        )
    })
}

pub async fn start_interview_handler(
    request: Json<StartInterviewRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let role = request.role.as_deref().unwrap_or("full-stack developer");
    let mix = request.difficulty_mix.as_deref().unwrap_or("mixed");
    info!(
        "Starting interview for candidate {} (role: {})",
        request.candidate_id, role
    );

    let session = service
        .start_session(request.candidate_id, role, mix)
        .await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn get_session_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.get_session(id).await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn current_question_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<CurrentQuestionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.get_session(id).await?;

    let question = session.current_question().cloned().ok_or_else(|| {
        ApiError::new(
            Status::Conflict,
            "No more questions available".to_string(),
            "NO_CURRENT_QUESTION",
            vec!["The session has answered every question".to_string()],
        )
    })?;

    Ok(Json(CurrentQuestionResponse {
        current_index: session.current_question_index,
        total_questions: session.questions.len(),
        remaining_seconds: session.remaining_seconds(Utc::now()),
        progress_percent: session.progress_percent(),
        question,
    }))
}

pub async fn progress_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.get_session(id).await?;

    Ok(Json(ProgressResponse {
        status: session.status.as_str().to_string(),
        progress_percent: session.progress_percent(),
        current_question: session.current_question_index + 1,
        total_questions: session.questions.len(),
        answered_questions: session.answers.len(),
        total_time_seconds: session.total_time_seconds(),
        remaining_seconds: session.remaining_seconds(Utc::now()),
    }))
}

pub async fn history_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.get_session(id).await?;

    let history: Vec<HistoryEntry> = session
        .questions
        .iter()
        .enumerate()
        .map(|(i, question)| HistoryEntry {
            question_number: i + 1,
            question: question.clone(),
            answer: session.answers.get(i).cloned(),
        })
        .collect();

    let scores: Vec<f64> = session
        .answers
        .iter()
        .filter_map(|a| a.score.map(f64::from))
        .collect();
    let average_score = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    Ok(Json(HistoryResponse {
        session: SessionResponse::from_session(&session, Utc::now()),
        history,
        average_score,
    }))
}

pub async fn submit_answer_handler(
    id: &str,
    request: Json<SubmitAnswerRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let request = request.into_inner();

    let session = service
        .submit_answer(id, request.question_id, request.text, request.auto_submitted)
        .await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn expire_handler(
    id: &str,
    request: Json<ExpireRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.expire(id, request.into_inner().draft_text).await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn pause_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.pause(id).await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn resume_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.resume(id).await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn complete_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.complete(id).await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}

pub async fn abandon_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(id)?;
    let session = service.abandon(id).await?;
    Ok(Json(SessionResponse::from_session(&session, Utc::now())))
}
