// src/service.rs
//! Orchestration around the session state machine: per-session write
//! serialization, transactional persistence, collaborator calls with
//! fallbacks, and lifecycle event publication.
//!
//! Single-writer discipline: every mutating operation on a session runs
//! under that session's async mutex, loads the persisted document, applies
//! the pure transition and commits session + candidate rows in one
//! transaction. Operations on different sessions share nothing.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::{fallback, ProfileExtractor, QuestionBank, ScoreCard, Scorer, Summarizer};
use crate::db::{is_unique_violation, Candidate, CandidateRepository, Database, SessionRepository};
use crate::error::{SessionError, SessionResult};
use crate::notify::{Notifier, SessionEvent};
use crate::session::{InterviewSession, Question};

/// Per-id async mutexes. Also used to serialize session creation per
/// candidate (candidate ids and session ids never collide). Entries are
/// weak: a lock lives only while some operation holds it, and dead entries
/// are pruned on every acquire, so lookups for arbitrary ids cannot grow
/// the map beyond the operations currently in flight.
#[derive(Default)]
struct LockRegistry {
    inner: Mutex<HashMap<Uuid, Weak<Mutex<()>>>>,
}

impl LockRegistry {
    async fn acquire(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().await;
        map.retain(|_, slot| slot.strong_count() > 0);
        if let Some(lock) = map.get(&id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        map.insert(id, Arc::downgrade(&lock));
        lock
    }
}

enum Submission {
    Manual { question_id: String, text: String },
    Expired { draft: String },
}

pub struct InterviewService {
    db: Database,
    question_bank: Arc<dyn QuestionBank>,
    scorer: Arc<dyn Scorer>,
    summarizer: Arc<dyn Summarizer>,
    extractor: Arc<dyn ProfileExtractor>,
    notifier: Arc<dyn Notifier>,
    locks: LockRegistry,
}

impl InterviewService {
    pub fn new(
        db: Database,
        question_bank: Arc<dyn QuestionBank>,
        scorer: Arc<dyn Scorer>,
        summarizer: Arc<dyn Summarizer>,
        extractor: Arc<dyn ProfileExtractor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            question_bank,
            scorer,
            summarizer,
            extractor,
            notifier,
            locks: LockRegistry::default(),
        }
    }

    pub async fn health(&self) -> anyhow::Result<()> {
        self.db.health_check().await
    }

    // ===== Candidate operations =====

    pub async fn create_candidate(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> SessionResult<Candidate> {
        let repo = CandidateRepository::new(self.db.pool());
        // The email UNIQUE constraint is the arbiter for concurrent inserts.
        match repo.create(name, email, phone).await {
            Ok(candidate) => Ok(candidate),
            Err(e) if is_unique_violation(&e) => {
                Err(SessionError::DuplicateEmail(email.trim().to_lowercase()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_candidates(&self) -> SessionResult<Vec<Candidate>> {
        Ok(CandidateRepository::new(self.db.pool()).list().await?)
    }

    pub async fn get_candidate(&self, id: Uuid) -> SessionResult<Candidate> {
        CandidateRepository::new(self.db.pool())
            .find_by_id(id)
            .await?
            .ok_or_else(|| SessionError::not_found("candidate", id))
    }

    /// Forwards the resume to the extraction service and fills any profile
    /// fields the candidate record is still missing. Extraction failure is
    /// not an error: the upload is recorded and the gaps stay reported.
    pub async fn upload_resume(
        &self,
        candidate_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> SessionResult<Candidate> {
        let repo = CandidateRepository::new(self.db.pool());
        let mut candidate = self.get_candidate(candidate_id).await?;

        match self.extractor.extract(file_name, bytes).await {
            Ok(profile) => {
                if candidate.name.trim().is_empty() {
                    if let Some(name) = profile.name.filter(|n| !n.trim().is_empty()) {
                        candidate.name = name;
                    }
                }
                if candidate.email.trim().is_empty() {
                    if let Some(email) = profile.email.filter(|e| !e.trim().is_empty()) {
                        candidate.email = email.to_lowercase();
                    }
                }
                if candidate.phone.is_none() {
                    candidate.phone = profile.phone.filter(|p| !p.trim().is_empty());
                }
                info!(
                    "Resume extracted for candidate {} (confidence {:.2})",
                    candidate_id, profile.confidence
                );
            }
            Err(e) => {
                warn!(
                    "Profile extraction unavailable for candidate {}: {}",
                    candidate_id, e
                );
            }
        }

        candidate.resume_uploaded = true;
        candidate.missing_fields = candidate.compute_missing_fields();
        repo.update_profile(&candidate).await?;
        Ok(candidate)
    }

    // ===== Session lifecycle =====

    /// Starts an interview for the candidate. At most one open session per
    /// candidate; creation is serialized per candidate id so concurrent
    /// starts cannot both slip past the check.
    pub async fn start_session(
        &self,
        candidate_id: Uuid,
        role: &str,
        difficulty_mix: &str,
    ) -> SessionResult<InterviewSession> {
        let lock = self.locks.acquire(candidate_id).await;
        let _guard = lock.lock().await;

        let candidate = self.get_candidate(candidate_id).await?;
        let sessions = SessionRepository::new(self.db.pool());
        if sessions.find_open_by_candidate(candidate_id).await?.is_some() {
            return Err(SessionError::AlreadyOpen);
        }

        let questions = match self.question_bank.generate(role, difficulty_mix).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!("Question generation unavailable, using static set: {}", e);
                fallback::question_set()
            }
        };

        let session = InterviewSession::start(candidate_id, questions, Utc::now())?;
        sessions.insert(&session).await?;

        info!(
            "Started session {} for candidate {} ({} questions)",
            session.id, candidate.name, session.questions.len()
        );
        self.notifier.publish(&SessionEvent::SessionStarted {
            session_id: session.id,
            candidate_id,
            total_questions: session.questions.len(),
        });
        if let Some(question) = session.current_question() {
            self.notifier.publish(&SessionEvent::TimerStarted {
                session_id: session.id,
                question_id: question.id.clone(),
                time_limit_seconds: question.time_limit_seconds,
            });
        }
        Ok(session)
    }

    pub async fn get_session(&self, id: Uuid) -> SessionResult<InterviewSession> {
        SessionRepository::new(self.db.pool())
            .find_by_id(id)
            .await?
            .ok_or_else(|| SessionError::not_found("session", id))
    }

    /// Remaining time is a pure function of persisted state and the clock;
    /// no lock is needed for reads.
    pub async fn remaining_seconds(&self, id: Uuid) -> SessionResult<u32> {
        let session = self.get_session(id).await?;
        Ok(session.remaining_seconds(Utc::now()))
    }

    pub async fn submit_answer(
        self: &Arc<Self>,
        session_id: Uuid,
        question_id: String,
        text: String,
        auto_submitted: bool,
    ) -> SessionResult<InterviewSession> {
        let submission = if auto_submitted {
            Submission::Expired { draft: text }
        } else {
            Submission::Manual { question_id, text }
        };
        self.process_submission(session_id, submission).await
    }

    /// Timer-expiry path: records the candidate's draft (possibly empty)
    /// as an auto-submitted answer for the full time limit.
    pub async fn expire(
        self: &Arc<Self>,
        session_id: Uuid,
        draft_text: Option<String>,
    ) -> SessionResult<InterviewSession> {
        self.process_submission(
            session_id,
            Submission::Expired {
                draft: draft_text.unwrap_or_default(),
            },
        )
        .await
    }

    async fn process_submission(
        self: &Arc<Self>,
        session_id: Uuid,
        submission: Submission,
    ) -> SessionResult<InterviewSession> {
        let lock = self.locks.acquire(session_id).await;
        let _guard = lock.lock().await;

        let sessions = SessionRepository::new(self.db.pool());
        let mut session = sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found("session", session_id))?;
        let now = Utc::now();

        let (outcome, text, auto_submitted) = match submission {
            Submission::Manual { question_id, text } => (
                session.submit_answer(&question_id, text.clone(), false, now)?,
                text,
                false,
            ),
            Submission::Expired { draft } => {
                (session.expire(draft.clone(), now)?, draft, true)
            }
        };
        let question = session.questions[outcome.answer_index].clone();
        let time_spent = session.answers[outcome.answer_index].time_spent_seconds;

        if outcome.all_answered {
            // The last answer is scored inline: completion fixes the final
            // score, so there is no later delivery to wait for.
            let card = self.score_with_fallback(&question, &text, time_spent).await;
            session.apply_score(outcome.answer_index, card.score, card.feedback);
            let candidate = self.get_candidate(session.candidate_id).await?;
            self.finalize(&mut session, &candidate.name, now).await?;
        }
        sessions.persist_transition(&session).await?;

        self.notifier.publish(&SessionEvent::AnswerSubmitted {
            session_id,
            question_id: question.id.clone(),
            auto_submitted,
            is_complete: outcome.all_answered,
        });

        if outcome.all_answered {
            self.notifier.publish(&SessionEvent::SessionCompleted {
                session_id,
                final_score: session.final_score.unwrap_or(0.0),
            });
        } else {
            if let Some(next) = session.current_question() {
                self.notifier.publish(&SessionEvent::TimerStarted {
                    session_id,
                    question_id: next.id.clone(),
                    time_limit_seconds: next.time_limit_seconds,
                });
            }
            self.dispatch_scoring(session_id, question, text, time_spent, outcome.answer_index);
        }
        Ok(session)
    }

    pub async fn pause(&self, session_id: Uuid) -> SessionResult<InterviewSession> {
        let session = self.mutate(session_id, |s, now| s.pause(now)).await?;
        self.notifier
            .publish(&SessionEvent::SessionPaused { session_id });
        Ok(session)
    }

    pub async fn resume(&self, session_id: Uuid) -> SessionResult<InterviewSession> {
        let session = self.mutate(session_id, |s, now| s.resume(now)).await?;
        self.notifier
            .publish(&SessionEvent::SessionResumed { session_id });
        Ok(session)
    }

    /// Early termination: completes with whatever has been answered so far.
    pub async fn complete(&self, session_id: Uuid) -> SessionResult<InterviewSession> {
        let lock = self.locks.acquire(session_id).await;
        let _guard = lock.lock().await;

        let sessions = SessionRepository::new(self.db.pool());
        let mut session = sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found("session", session_id))?;
        let candidate = self.get_candidate(session.candidate_id).await?;

        self.finalize(&mut session, &candidate.name, Utc::now()).await?;
        sessions.persist_transition(&session).await?;

        self.notifier.publish(&SessionEvent::SessionCompleted {
            session_id,
            final_score: session.final_score.unwrap_or(0.0),
        });
        Ok(session)
    }

    pub async fn abandon(&self, session_id: Uuid) -> SessionResult<InterviewSession> {
        let session = self.mutate(session_id, |s, now| s.abandon(now)).await?;
        self.notifier
            .publish(&SessionEvent::SessionAbandoned { session_id });
        Ok(session)
    }

    // ===== Internals =====

    async fn mutate<F>(&self, session_id: Uuid, op: F) -> SessionResult<InterviewSession>
    where
        F: FnOnce(&mut InterviewSession, DateTime<Utc>) -> SessionResult<()>,
    {
        let lock = self.locks.acquire(session_id).await;
        let _guard = lock.lock().await;

        let sessions = SessionRepository::new(self.db.pool());
        let mut session = sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found("session", session_id))?;
        op(&mut session, Utc::now())?;
        sessions.persist_transition(&session).await?;
        Ok(session)
    }

    /// The completion transition plus summary gathering. The summarizer is
    /// external and may fail; the templated fallback keeps completion from
    /// ever blocking on it.
    async fn finalize(
        &self,
        session: &mut InterviewSession,
        candidate_name: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<()> {
        session.complete(now)?;
        let summary = match self
            .summarizer
            .summarize(candidate_name, &session.questions, &session.answers)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Summarizer unavailable, using template: {}", e);
                fallback::summarize(candidate_name, &session.questions, &session.answers)
            }
        };
        session.record_summary(summary);
        Ok(())
    }

    async fn score_with_fallback(
        &self,
        question: &Question,
        text: &str,
        time_spent: u32,
    ) -> ScoreCard {
        match self.scorer.score(question, text, time_spent).await {
            Ok(card) => card,
            Err(e) => {
                warn!("Scorer unavailable, using fallback heuristic: {}", e);
                fallback::score_answer(question, text, time_spent)
            }
        }
    }

    /// Fire-and-observe scoring: the caller returns immediately; the score
    /// lands on the persisted answer when the scorer responds, or the
    /// deterministic fallback does. Either way progression was never
    /// blocked.
    fn dispatch_scoring(
        self: &Arc<Self>,
        session_id: Uuid,
        question: Question,
        text: String,
        time_spent: u32,
        answer_index: usize,
    ) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let card = service.score_with_fallback(&question, &text, time_spent).await;
            if let Err(e) = service.apply_score(session_id, answer_index, card).await {
                warn!(
                    "Failed to record score for session {} answer {}: {}",
                    session_id, answer_index, e
                );
            }
        });
    }

    /// Re-enters through the session lock; a no-op when the session turned
    /// terminal in the meantime (completion already backfilled a score).
    async fn apply_score(
        &self,
        session_id: Uuid,
        answer_index: usize,
        card: ScoreCard,
    ) -> SessionResult<()> {
        let lock = self.locks.acquire(session_id).await;
        let _guard = lock.lock().await;

        let sessions = SessionRepository::new(self.db.pool());
        let Some(mut session) = sessions.find_by_id(session_id).await? else {
            return Ok(());
        };
        if session.apply_score(answer_index, card.score, card.feedback) {
            sessions.persist_transition(&session).await?;
        }
        Ok(())
    }
}
