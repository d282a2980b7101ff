// src/web/handlers/system_handlers.rs

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use tracing::error;

use crate::service::InterviewService;
use crate::web::types::HealthResponse;

pub async fn health_handler(service: &State<Arc<InterviewService>>) -> Json<HealthResponse> {
    match service.health().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            database: "ok",
        }),
        Err(e) => {
            error!("Health check failed: {}", e);
            Json(HealthResponse {
                status: "degraded",
                database: "unreachable",
            })
        }
    }
}
