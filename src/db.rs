// src/db.rs
//! SQLite persistence for candidates and interview sessions.
//!
//! A session is a document-like row: the question sequence, answer list and
//! timer state are stored as JSON columns so the state machine can be
//! reconstructed exactly as persisted. The candidate row carries only the
//! denormalized interview status and result fields, and both rows are
//! written in one transaction on every lifecycle transition.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::session::{InterviewSession, SessionStatus};

// ===== Connection management =====

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create new database connection with automatic setup.
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!(
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        // A pooled :memory: database is per-connection; pin the pool to one
        // connection so every query sees the migrated schema.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT,
                interview_status TEXT NOT NULL DEFAULT 'not_started',
                final_score REAL,
                summary TEXT,
                resume_uploaded BOOLEAN NOT NULL DEFAULT FALSE,
                missing_fields TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                candidate_id TEXT NOT NULL REFERENCES candidates(id),
                status TEXT NOT NULL,
                current_question_index INTEGER NOT NULL,
                questions TEXT NOT NULL,
                answers TEXT NOT NULL,
                timer_state TEXT NOT NULL,
                final_score REAL,
                summary TEXT,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                last_activity_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_candidates_status ON candidates(interview_status);")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_candidates_score ON candidates(final_score DESC);")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_candidate ON sessions(candidate_id);")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);")
            .execute(&self.pool)
            .await?;

        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

/// True when the error chain bottoms out in a UNIQUE constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map_or(false, |db_err| db_err.is_unique_violation())
}

// ===== Candidate model =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
}

impl CandidateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Candidate mirror of a session status.
    pub fn from_session(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Active | SessionStatus::Paused => Self::InProgress,
            SessionStatus::Completed => Self::Completed,
            SessionStatus::Abandoned => Self::Abandoned,
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            other => anyhow::bail!("unknown candidate status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub interview_status: CandidateStatus,
    pub final_score: Option<f64>,
    pub summary: Option<String>,
    pub resume_uploaded: bool,
    pub missing_fields: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// Profile fields a recruiter still needs to collect.
    pub fn compute_missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        if self.email.trim().is_empty() {
            missing.push("email".to_string());
        }
        if self.phone.as_deref().map_or(true, |p| p.trim().is_empty()) {
            missing.push("phone".to_string());
        }
        missing
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    interview_status: String,
    final_score: Option<f64>,
    summary: Option<String>,
    resume_uploaded: bool,
    missing_fields: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = anyhow::Error;

    fn try_from(row: CandidateRow) -> Result<Self> {
        Ok(Candidate {
            id: Uuid::parse_str(&row.id).context("invalid candidate id")?,
            name: row.name,
            email: row.email,
            phone: row.phone,
            interview_status: row.interview_status.parse()?,
            final_score: row.final_score,
            summary: row.summary,
            resume_uploaded: row.resume_uploaded,
            missing_fields: serde_json::from_str(&row.missing_fields)
                .context("invalid missing_fields column")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ===== Session row mapping =====

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    candidate_id: String,
    status: String,
    current_question_index: i64,
    questions: String,
    answers: String,
    timer_state: String,
    final_score: Option<f64>,
    summary: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    last_activity_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for InterviewSession {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(InterviewSession {
            id: Uuid::parse_str(&row.id).context("invalid session id")?,
            candidate_id: Uuid::parse_str(&row.candidate_id).context("invalid candidate id")?,
            status: row.status.parse()?,
            questions: serde_json::from_str(&row.questions).context("invalid questions column")?,
            answers: serde_json::from_str(&row.answers).context("invalid answers column")?,
            current_question_index: row.current_question_index as usize,
            timer: serde_json::from_str(&row.timer_state).context("invalid timer_state column")?,
            final_score: row.final_score,
            summary: row.summary,
            started_at: row.started_at,
            completed_at: row.completed_at,
            last_activity_at: row.last_activity_at,
        })
    }
}

// ===== Candidate repository =====

pub struct CandidateRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CandidateRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Candidate> {
        let now = Utc::now();
        let mut candidate = Candidate {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            phone: phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            interview_status: CandidateStatus::NotStarted,
            final_score: None,
            summary: None,
            resume_uploaded: false,
            missing_fields: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        candidate.missing_fields = candidate.compute_missing_fields();

        sqlx::query(
            r#"
            INSERT INTO candidates
                (id, name, email, phone, interview_status, resume_uploaded,
                 missing_fields, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(candidate.id.to_string())
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(candidate.interview_status.as_str())
        .bind(candidate.resume_uploaded)
        .bind(serde_json::to_string(&candidate.missing_fields)?)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .context("Failed to insert candidate")?;

        info!("Created candidate {} ({})", candidate.name, candidate.id);
        Ok(candidate)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Candidate>> {
        let row = sqlx::query_as::<_, CandidateRow>(
            "SELECT * FROM candidates WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(Candidate::try_from).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Candidate>> {
        let row = sqlx::query_as::<_, CandidateRow>(
            "SELECT * FROM candidates WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.pool)
        .await?;

        row.map(Candidate::try_from).transpose()
    }

    /// Recruiter dashboard ordering: best score first, then most recent.
    pub async fn list(&self) -> Result<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT * FROM candidates
            ORDER BY final_score DESC NULLS LAST, created_at DESC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Candidate::try_from).collect()
    }

    /// Writes profile fields after resume extraction.
    pub async fn update_profile(&self, candidate: &Candidate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE candidates
            SET name = ?, email = ?, phone = ?, resume_uploaded = ?,
                missing_fields = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(candidate.resume_uploaded)
        .bind(serde_json::to_string(&candidate.missing_fields)?)
        .bind(Utc::now())
        .bind(candidate.id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update candidate profile")?;
        Ok(())
    }
}

// ===== Session repository =====

pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, session: &InterviewSession) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, candidate_id, status, current_question_index, questions,
                 answers, timer_state, final_score, summary, started_at,
                 completed_at, last_activity_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.candidate_id.to_string())
        .bind(session.status.as_str())
        .bind(session.current_question_index as i64)
        .bind(serde_json::to_string(&session.questions)?)
        .bind(serde_json::to_string(&session.answers)?)
        .bind(serde_json::to_string(&session.timer)?)
        .bind(session.final_score)
        .bind(&session.summary)
        .bind(session.started_at)
        .bind(session.completed_at)
        .bind(session.last_activity_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert session")?;

        Self::sync_candidate(&mut tx, session).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<InterviewSession>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(InterviewSession::try_from).transpose()
    }

    /// The at-most-one open session per candidate invariant is checked
    /// against this lookup before a new session is created.
    pub async fn find_open_by_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Option<InterviewSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM sessions
            WHERE candidate_id = ? AND status IN ('active', 'paused')
            LIMIT 1
            "#,
        )
        .bind(candidate_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(InterviewSession::try_from).transpose()
    }

    /// Persists a lifecycle transition: the session row and the candidate's
    /// denormalized status/result columns commit together or not at all.
    pub async fn persist_transition(&self, session: &InterviewSession) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET status = ?, current_question_index = ?, answers = ?,
                timer_state = ?, final_score = ?, summary = ?,
                completed_at = ?, last_activity_at = ?
            WHERE id = ?
            "#,
        )
        .bind(session.status.as_str())
        .bind(session.current_question_index as i64)
        .bind(serde_json::to_string(&session.answers)?)
        .bind(serde_json::to_string(&session.timer)?)
        .bind(session.final_score)
        .bind(&session.summary)
        .bind(session.completed_at)
        .bind(session.last_activity_at)
        .bind(session.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update session")?;

        Self::sync_candidate(&mut tx, session).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn sync_candidate(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        session: &InterviewSession,
    ) -> Result<()> {
        let status = CandidateStatus::from_session(session.status);
        sqlx::query(
            r#"
            UPDATE candidates
            SET interview_status = ?, final_score = ?, summary = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(session.final_score)
        .bind(&session.summary)
        .bind(Utc::now())
        .bind(session.candidate_id.to_string())
        .execute(&mut **tx)
        .await
        .context("Failed to sync candidate record")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::fallback;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2024-03-01T09:00:00Z".parse().expect("timestamp")
    }

    async fn seeded() -> (Database, Candidate) {
        let db = Database::in_memory().await.expect("db");
        let candidate = CandidateRepository::new(db.pool())
            .create("Ada Lovelace", "ada@example.com", Some("+41 79 000 00 00"))
            .await
            .expect("candidate");
        (db, candidate)
    }

    #[tokio::test]
    async fn candidate_round_trip() {
        let (db, candidate) = seeded().await;
        let repo = CandidateRepository::new(db.pool());

        let loaded = repo
            .find_by_id(candidate.id)
            .await
            .expect("query")
            .expect("present");
        assert_eq!(loaded.email, "ada@example.com");
        assert_eq!(loaded.interview_status, CandidateStatus::NotStarted);
        assert!(loaded.missing_fields.is_empty());

        let by_email = repo.find_by_email("ADA@example.com").await.expect("query");
        assert!(by_email.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_insert_is_a_unique_violation() {
        let (db, _) = seeded().await;
        let err = CandidateRepository::new(db.pool())
            .create("Other", "ada@example.com", None)
            .await
            .expect_err("duplicate email");
        assert!(is_unique_violation(&err));

        let other = CandidateRepository::new(db.pool())
            .create("Other", "other@example.com", None)
            .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn session_round_trip_reproduces_remaining_seconds() {
        let (db, candidate) = seeded().await;
        let repo = SessionRepository::new(db.pool());

        let mut session =
            InterviewSession::start(candidate.id, fallback::question_set(), t0()).expect("start");
        session.pause(t0() + Duration::seconds(4)).expect("pause");
        session.resume(t0() + Duration::seconds(100)).expect("resume");
        repo.insert(&session).await.expect("insert");
        session.pause(t0() + Duration::seconds(110)).expect("pause again");
        repo.persist_transition(&session).await.expect("persist");

        let restored = repo
            .find_by_id(session.id)
            .await
            .expect("query")
            .expect("present");

        let probe = t0() + Duration::seconds(9999);
        assert_eq!(
            restored.remaining_seconds(probe),
            session.remaining_seconds(probe)
        );
        assert_eq!(restored.status, SessionStatus::Paused);
        assert_eq!(restored.questions, session.questions);
    }

    #[tokio::test]
    async fn open_session_lookup_ignores_terminal_sessions() {
        let (db, candidate) = seeded().await;
        let repo = SessionRepository::new(db.pool());

        let mut session =
            InterviewSession::start(candidate.id, fallback::question_set(), t0()).expect("start");
        repo.insert(&session).await.expect("insert");
        assert!(repo
            .find_open_by_candidate(candidate.id)
            .await
            .expect("query")
            .is_some());

        session.abandon(t0() + Duration::seconds(5)).expect("abandon");
        repo.persist_transition(&session).await.expect("persist");
        assert!(repo
            .find_open_by_candidate(candidate.id)
            .await
            .expect("query")
            .is_none());
    }

    #[tokio::test]
    async fn transition_syncs_the_candidate_row() {
        let (db, candidate) = seeded().await;
        let sessions = SessionRepository::new(db.pool());
        let candidates = CandidateRepository::new(db.pool());

        let mut session =
            InterviewSession::start(candidate.id, fallback::question_set(), t0()).expect("start");
        sessions.insert(&session).await.expect("insert");

        let in_progress = candidates
            .find_by_id(candidate.id)
            .await
            .expect("query")
            .expect("present");
        assert_eq!(in_progress.interview_status, CandidateStatus::InProgress);

        session.complete(t0() + Duration::seconds(30)).expect("complete");
        session.record_summary("solid showing".into());
        sessions.persist_transition(&session).await.expect("persist");

        let done = candidates
            .find_by_id(candidate.id)
            .await
            .expect("query")
            .expect("present");
        assert_eq!(done.interview_status, CandidateStatus::Completed);
        assert_eq!(done.final_score, session.final_score);
        assert_eq!(done.summary.as_deref(), Some("solid showing"));
    }

    #[tokio::test]
    async fn dashboard_list_orders_by_score() {
        let (db, first) = seeded().await;
        let candidates = CandidateRepository::new(db.pool());
        let sessions = SessionRepository::new(db.pool());

        let second = candidates
            .create("Grace Hopper", "grace@example.com", None)
            .await
            .expect("candidate");

        let mut low = InterviewSession::start(first.id, fallback::question_set(), t0())
            .expect("start");
        low.complete(t0()).expect("complete");
        sessions.insert(&low).await.expect("insert");
        sessions.persist_transition(&low).await.expect("persist");

        let mut high = InterviewSession::start(second.id, fallback::question_set(), t0())
            .expect("start");
        high.submit_answer(
            "q1",
            "a thorough answer with plenty of relevant detail included".into(),
            false,
            t0() + chrono::Duration::seconds(18),
        )
        .expect("submit");
        high.complete(t0() + chrono::Duration::seconds(20)).expect("complete");
        sessions.insert(&high).await.expect("insert");
        sessions.persist_transition(&high).await.expect("persist");

        let listed = candidates.list().await.expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].final_score >= listed[1].final_score);
    }
}
