// src/ai/client.rs
//! HTTP client for the external AI service. One client covers question
//! generation, answer scoring, summarization and resume profile extraction;
//! every call can fail and every caller degrades to the local fallbacks.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::trace;

use crate::ai::{ProfileExtractor, ProfileFields, QuestionBank, ScoreCard, Scorer, Summarizer};
use crate::session::{Answer, Question};

const GENERATE_QUESTIONS_ENDPOINT: &str = "/generate-questions";
const SCORE_ANSWER_ENDPOINT: &str = "/score-answer";
const SUMMARIZE_ENDPOINT: &str = "/summarize";
const EXTRACT_PROFILE_ENDPOINT: &str = "/extract-profile";

pub struct AiServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    questions: Vec<Question>,
    status: String,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: u8,
    feedback: String,
    status: String,
}

#[derive(Deserialize)]
struct SummaryResponse {
    summary: String,
    status: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(flatten)]
    profile: ProfileFields,
    status: String,
}

impl AiServiceClient {
    pub fn new(base_url: String, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    async fn post_json<T, R>(&self, endpoint: &str, payload: &T) -> Result<R>
    where
        T: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        trace!("Calling AI service: {}", url);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to POST to {}", url))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<R>()
                .await
                .context("Failed to parse JSON response")
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("AI service returned {}: {}", status, error_text)
        }
    }

    fn content_type_for(file_name: &str) -> Result<&'static str> {
        let lower_name = file_name.to_lowercase();
        if lower_name.ends_with(".pdf") {
            Ok("application/pdf")
        } else if lower_name.ends_with(".docx") {
            Ok("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        } else {
            anyhow::bail!("Unsupported resume format: {}", file_name)
        }
    }

    fn history_payload(questions: &[Question], answers: &[Answer]) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = questions
            .iter()
            .zip(answers.iter())
            .map(|(q, a)| {
                serde_json::json!({
                    "question": q.text,
                    "difficulty": q.difficulty,
                    "answer": a.text,
                    "time_spent_seconds": a.time_spent_seconds,
                    "score": a.score,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

#[rocket::async_trait]
impl QuestionBank for AiServiceClient {
    async fn generate(&self, role: &str, difficulty_mix: &str) -> Result<Vec<Question>> {
        let payload = serde_json::json!({
            "role": role,
            "difficulty_mix": difficulty_mix,
        });
        let response: QuestionsResponse =
            self.post_json(GENERATE_QUESTIONS_ENDPOINT, &payload).await?;

        if response.status != "success" {
            anyhow::bail!("Question generation failed: {}", response.status);
        }
        if response.questions.is_empty() {
            anyhow::bail!("Question generation returned an empty set");
        }
        // Re-key ids so they are unique within the session regardless of
        // what the model produced.
        Ok(response
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, mut q)| {
                q.id = format!("q{}", i + 1);
                q.ai_generated = true;
                q
            })
            .collect())
    }
}

#[rocket::async_trait]
impl Scorer for AiServiceClient {
    async fn score(
        &self,
        question: &Question,
        answer_text: &str,
        time_spent_seconds: u32,
    ) -> Result<ScoreCard> {
        let payload = serde_json::json!({
            "question": question,
            "answer": answer_text,
            "time_spent_seconds": time_spent_seconds,
        });
        let response: ScoreResponse = self.post_json(SCORE_ANSWER_ENDPOINT, &payload).await?;

        if response.status != "success" {
            anyhow::bail!("Scoring failed: {}", response.status);
        }
        Ok(ScoreCard {
            score: response.score.min(100),
            feedback: response.feedback,
        })
    }
}

#[rocket::async_trait]
impl Summarizer for AiServiceClient {
    async fn summarize(
        &self,
        candidate_name: &str,
        questions: &[Question],
        answers: &[Answer],
    ) -> Result<String> {
        let payload = serde_json::json!({
            "candidate_name": candidate_name,
            "history": Self::history_payload(questions, answers),
        });
        let response: SummaryResponse = self.post_json(SUMMARIZE_ENDPOINT, &payload).await?;

        if response.status != "success" {
            anyhow::bail!("Summarization failed: {}", response.status);
        }
        Ok(response.summary)
    }
}

#[rocket::async_trait]
impl ProfileExtractor for AiServiceClient {
    async fn extract(&self, file_name: &str, bytes: Vec<u8>) -> Result<ProfileFields> {
        let content_type = Self::content_type_for(file_name)?;
        let url = format!("{}{}", self.base_url, EXTRACT_PROFILE_ENDPOINT);

        let form = Form::new().part(
            "resume_file",
            Part::bytes(bytes)
                .file_name(file_name.to_string())
                .mime_str(content_type)
                .context("Failed to create multipart")?,
        );

        trace!("Calling profile extraction service: {}", url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if status.is_success() {
            let extract: ExtractResponse = response
                .json()
                .await
                .context("Failed to parse extraction response")?;
            if extract.status != "success" {
                anyhow::bail!("Profile extraction failed: {}", extract.status);
            }
            Ok(extract.profile)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Extraction service returned {}: {}", status, error_text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_accepts_pdf_and_docx_only() {
        assert_eq!(
            AiServiceClient::content_type_for("resume.pdf").unwrap(),
            "application/pdf"
        );
        assert!(AiServiceClient::content_type_for("Resume.DOCX").is_ok());
        assert!(AiServiceClient::content_type_for("resume.txt").is_err());
        assert!(AiServiceClient::content_type_for("noext").is_err());
    }
}
