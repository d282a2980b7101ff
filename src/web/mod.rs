// src/web/mod.rs

pub mod handlers;
pub mod types;

pub use types::*;

use std::sync::Arc;

use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::form::Form;
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catchers, get, options, post, routes, Request, Response, State};
use tracing::info;

use crate::ai::AiServiceClient;
use crate::config::ConfigManager;
use crate::db::{Candidate, Database};
use crate::notify::LogNotifier;
use crate::service::InterviewService;

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
    }
}

// ===== Candidate routes =====

#[post("/candidates", data = "<request>")]
pub async fn create_candidate(
    request: Json<CreateCandidateRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Candidate>, ApiError> {
    handlers::create_candidate_handler(request, service).await
}

#[get("/candidates")]
pub async fn list_candidates(
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    handlers::list_candidates_handler(service).await
}

#[get("/candidates/<id>")]
pub async fn get_candidate(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Candidate>, ApiError> {
    handlers::get_candidate_handler(id, service).await
}

#[post("/candidates/<id>/resume", data = "<upload>")]
pub async fn upload_resume(
    id: &str,
    upload: Form<ResumeUploadForm<'_>>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Candidate>, ApiError> {
    handlers::upload_resume_handler(id, upload, service).await
}

// ===== Interview routes =====

#[post("/interviews/start", data = "<request>")]
pub async fn start_interview(
    request: Json<StartInterviewRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::start_interview_handler(request, service).await
}

#[get("/interviews/<id>")]
pub async fn get_session(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::get_session_handler(id, service).await
}

#[get("/interviews/<id>/current-question")]
pub async fn current_question(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<CurrentQuestionResponse>, ApiError> {
    handlers::current_question_handler(id, service).await
}

#[get("/interviews/<id>/progress")]
pub async fn progress(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<ProgressResponse>, ApiError> {
    handlers::progress_handler(id, service).await
}

#[get("/interviews/<id>/history")]
pub async fn history(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<HistoryResponse>, ApiError> {
    handlers::history_handler(id, service).await
}

#[post("/interviews/<id>/submit-answer", data = "<request>")]
pub async fn submit_answer(
    id: &str,
    request: Json<SubmitAnswerRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::submit_answer_handler(id, request, service).await
}

#[post("/interviews/<id>/expire", data = "<request>")]
pub async fn expire(
    id: &str,
    request: Json<ExpireRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::expire_handler(id, request, service).await
}

#[post("/interviews/<id>/pause")]
pub async fn pause(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::pause_handler(id, service).await
}

#[post("/interviews/<id>/resume")]
pub async fn resume(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::resume_handler(id, service).await
}

#[post("/interviews/<id>/complete")]
pub async fn complete(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::complete_handler(id, service).await
}

#[post("/interviews/<id>/abandon")]
pub async fn abandon(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<SessionResponse>, ApiError> {
    handlers::abandon_handler(id, service).await
}

#[get("/health")]
pub async fn health(service: &State<Arc<InterviewService>>) -> Json<HealthResponse> {
    handlers::health_handler(service).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers
#[rocket::catch(400)]
pub fn bad_request() -> Json<ErrorResponse> {
    Json(ErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec![
            "Check your request JSON format".to_string(),
            "Verify all required fields are present".to_string(),
        ],
    ))
}

#[rocket::catch(404)]
pub fn route_not_found() -> Json<ErrorResponse> {
    Json(ErrorResponse::new(
        "Resource not found".to_string(),
        "NOT_FOUND".to_string(),
        vec!["Check the request path".to_string()],
    ))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<ErrorResponse> {
    Json(ErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
    ))
}

// Main server start function
pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    let db = Database::new(&config.environment.database_path).await?;

    let client = Arc::new(AiServiceClient::new(
        config.service.ai_service_url.clone(),
        config.service.timeout_seconds,
    )?);

    let service = Arc::new(InterviewService::new(
        db,
        client.clone(),
        client.clone(),
        client.clone(),
        client,
        Arc::new(LogNotifier),
    ));

    info!("Starting Intervue API server");
    info!("AI service: {}", config.service.ai_service_url);

    let _rocket = rocket::build()
        .attach(Cors)
        .manage(service)
        .register("/api", catchers![bad_request, route_not_found, internal_error])
        .mount(
            "/api",
            routes![
                create_candidate,
                list_candidates,
                get_candidate,
                upload_resume,
                start_interview,
                get_session,
                current_question,
                progress,
                history,
                submit_answer,
                expire,
                pause,
                resume,
                complete,
                abandon,
                health,
                options,
            ],
        )
        .launch()
        .await?;

    Ok(())
}
