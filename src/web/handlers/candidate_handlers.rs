// src/web/handlers/candidate_handlers.rs

use std::sync::Arc;

use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;
use uuid::Uuid;

use crate::db::Candidate;
use crate::service::InterviewService;
use crate::web::types::{ApiError, CreateCandidateRequest, ResumeUploadForm};

fn parse_id(entity: &'static str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::new(
            Status::NotFound,
            format!("{} {} not found", entity, raw),
            "NOT_FOUND",
            vec!["Check the identifier".to_string()],
        )
    })
}

pub async fn create_candidate_handler(
    request: Json<CreateCandidateRequest>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Candidate>, ApiError> {
    info!("Creating candidate: {}", request.email);
    let candidate = service
        .create_candidate(&request.name, &request.email, request.phone.as_deref())
        .await?;
    Ok(Json(candidate))
}

pub async fn list_candidates_handler(
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    Ok(Json(service.list_candidates().await?))
}

pub async fn get_candidate_handler(
    id: &str,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Candidate>, ApiError> {
    let id = parse_id("candidate", id)?;
    Ok(Json(service.get_candidate(id).await?))
}

pub async fn upload_resume_handler(
    id: &str,
    upload: Form<ResumeUploadForm<'_>>,
    service: &State<Arc<InterviewService>>,
) -> Result<Json<Candidate>, ApiError> {
    let id = parse_id("candidate", id)?;

    let file_name = upload
        .file
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_default();
    let lower = file_name.to_lowercase();
    if !lower.ends_with(".pdf") && !lower.ends_with(".docx") {
        return Err(ApiError::new(
            Status::UnprocessableEntity,
            "Invalid file type".to_string(),
            "INVALID_FILE_TYPE",
            vec!["Upload a PDF or DOCX resume".to_string()],
        ));
    }

    let path = upload.file.path().ok_or_else(|| {
        ApiError::new(
            Status::InternalServerError,
            "Upload was not persisted".to_string(),
            "UPLOAD_ERROR",
            vec!["Try again with a smaller file".to_string()],
        )
    })?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ApiError::new(
            Status::InternalServerError,
            format!("Failed to read upload: {}", e),
            "UPLOAD_ERROR",
            vec!["Try again in a few moments".to_string()],
        )
    })?;

    info!("Resume upload for candidate {}: {}", id, file_name);
    let candidate = service.upload_resume(id, &file_name, bytes).await?;
    Ok(Json(candidate))
}
