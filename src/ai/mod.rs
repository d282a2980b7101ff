// src/ai/mod.rs
//! External AI collaborators behind narrow traits, plus the deterministic
//! local fallbacks used when the service is unreachable. The service layer
//! degrades to the fallbacks on any error - a collaborator failure is never
//! surfaced to a candidate.

pub mod client;
pub mod fallback;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::session::{Answer, Question};

pub use client::AiServiceClient;

/// Score and feedback for one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: u8,
    pub feedback: String,
}

/// Contact fields extracted from an uploaded resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

#[rocket::async_trait]
pub trait QuestionBank: Send + Sync {
    /// Ordered question sequence for a role. May fail; callers fall back to
    /// [`fallback::question_set`].
    async fn generate(&self, role: &str, difficulty_mix: &str) -> Result<Vec<Question>>;
}

#[rocket::async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        question: &Question,
        answer_text: &str,
        time_spent_seconds: u32,
    ) -> Result<ScoreCard>;
}

#[rocket::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        candidate_name: &str,
        questions: &[Question],
        answers: &[Answer],
    ) -> Result<String>;
}

#[rocket::async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(&self, file_name: &str, bytes: Vec<u8>) -> Result<ProfileFields>;
}
