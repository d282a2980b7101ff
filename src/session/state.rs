// src/session/state.rs
//! The interview session lifecycle state machine.
//!
//! One session owns an ordered question sequence, an index-aligned
//! append-only answer list and the timer for the current question. Every
//! operation takes `now` and either fully applies its transition or leaves
//! the session unchanged; persistence and collaborator calls live in the
//! service layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::fallback;
use crate::error::{SessionError, SessionResult};
use crate::session::model::{Answer, Question, SessionStatus};
use crate::session::timer::TimerState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub status: SessionStatus,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub current_question_index: usize,
    pub timer: TimerState,
    pub final_score: Option<f64>,
    pub summary: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

/// What a submission did, so the caller knows whether to dispatch scoring
/// for the new answer and whether the session just ran out of questions.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOutcome {
    pub answer_index: usize,
    pub all_answered: bool,
}

impl InterviewSession {
    /// Creates a session in `active` state with the timer running for
    /// question 0. The one-open-session-per-candidate precondition is
    /// enforced by the service before calling this.
    pub fn start(
        candidate_id: Uuid,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> SessionResult<Self> {
        if questions.is_empty() {
            return Err(SessionError::Internal(anyhow::anyhow!(
                "cannot start a session without questions"
            )));
        }
        let timer = TimerState::start(questions[0].time_limit_seconds, now);
        Ok(Self {
            id: Uuid::new_v4(),
            candidate_id,
            status: SessionStatus::Active,
            questions,
            answers: Vec::new(),
            current_question_index: 0,
            timer,
            final_score: None,
            summary: None,
            started_at: now,
            completed_at: None,
            last_activity_at: now,
        })
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u32 {
        self.timer.remaining_seconds(now)
    }

    pub fn progress_percent(&self) -> u32 {
        if self.questions.is_empty() {
            return 0;
        }
        (self.current_question_index * 100 / self.questions.len()) as u32
    }

    /// Total active answering time across all recorded answers.
    pub fn total_time_seconds(&self) -> u64 {
        self.answers.iter().map(|a| a.time_spent_seconds as u64).sum()
    }

    /// Records the answer for the current question and advances. Accepted
    /// only while `active` and only for the question at the current index -
    /// duplicates and out-of-order submissions are rejected. Returns whether
    /// the question sequence is exhausted; the completion transition itself
    /// is a separate step so the caller can gather the summary first.
    pub fn submit_answer(
        &mut self,
        question_id: &str,
        text: String,
        auto_submitted: bool,
        now: DateTime<Utc>,
    ) -> SessionResult<SubmitOutcome> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(self.status));
        }
        let question = self
            .current_question()
            .ok_or(SessionError::InvalidState(self.status))?;
        if question.id != question_id {
            return Err(SessionError::QuestionMismatch {
                expected: question.id.clone(),
                got: question_id.to_string(),
            });
        }

        let limit = question.time_limit_seconds;
        let question_id = question.id.clone();
        let spent = self.timer.stop(now);
        // An expired timer consumed the full limit regardless of how late
        // the expiry check ran.
        let time_spent_seconds = if auto_submitted { limit } else { spent };

        self.answers.push(Answer {
            question_id,
            text,
            time_spent_seconds,
            submitted_at: now,
            auto_submitted,
            score: None,
            feedback: None,
        });
        let answer_index = self.current_question_index;
        self.current_question_index += 1;
        self.last_activity_at = now;

        let all_answered = self.current_question_index == self.questions.len();
        if !all_answered {
            let next_limit = self.questions[self.current_question_index].time_limit_seconds;
            self.timer = TimerState::start(next_limit, now);
        }

        Ok(SubmitOutcome {
            answer_index,
            all_answered,
        })
    }

    /// Auto-submit path taken when the per-question timer ran out. The only
    /// way an answer with empty or partial text gets recorded - a question
    /// is never silently dropped.
    pub fn expire(&mut self, draft_text: String, now: DateTime<Utc>) -> SessionResult<SubmitOutcome> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(self.status));
        }
        if self.remaining_seconds(now) > 0 {
            return Err(SessionError::TimerStillRunning);
        }
        let question_id = self
            .current_question()
            .ok_or(SessionError::InvalidState(self.status))?
            .id
            .clone();
        self.submit_answer(&question_id, draft_text, true, now)
    }

    /// Idempotent while paused; rejected from terminal states.
    pub fn pause(&mut self, now: DateTime<Utc>) -> SessionResult<()> {
        match self.status {
            SessionStatus::Paused => Ok(()),
            SessionStatus::Active => {
                self.timer.pause(now);
                self.status = SessionStatus::Paused;
                self.last_activity_at = now;
                Ok(())
            }
            status => Err(SessionError::InvalidState(status)),
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> SessionResult<()> {
        if self.status != SessionStatus::Paused {
            return Err(SessionError::InvalidState(self.status));
        }
        self.timer.resume(now);
        self.status = SessionStatus::Active;
        self.last_activity_at = now;
        Ok(())
    }

    /// Terminal transition: stops any running timer, backfills the
    /// deterministic fallback score for answers the scorer has not reached,
    /// and fixes `final_score` as the mean of all per-answer scores (0 when
    /// there are none). Never recomputed afterwards.
    pub fn complete(&mut self, now: DateTime<Utc>) -> SessionResult<()> {
        if self.status.is_terminal() {
            return Err(SessionError::InvalidState(self.status));
        }
        self.timer.stop(now);

        for (question, answer) in self.questions.iter().zip(self.answers.iter_mut()) {
            if answer.score.is_none() {
                let card = fallback::score_answer(
                    question,
                    &answer.text,
                    answer.time_spent_seconds,
                );
                answer.score = Some(card.score);
                answer.feedback = Some(card.feedback);
            }
        }

        let final_score = if self.answers.is_empty() {
            0.0
        } else {
            let sum: u64 = self.answers.iter().filter_map(|a| a.score).map(u64::from).sum();
            sum as f64 / self.answers.len() as f64
        };

        self.final_score = Some(final_score);
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.last_activity_at = now;
        Ok(())
    }

    /// Attaches the summary text exactly once; later calls are ignored so a
    /// stored summary is never overwritten.
    pub fn record_summary(&mut self, text: String) {
        if self.summary.is_none() {
            self.summary = Some(text);
        }
    }

    /// Cancellation primitive: any non-terminal state goes straight to
    /// `abandoned`.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> SessionResult<()> {
        if self.status.is_terminal() {
            return Err(SessionError::InvalidState(self.status));
        }
        self.timer.stop(now);
        self.status = SessionStatus::Abandoned;
        self.last_activity_at = now;
        Ok(())
    }

    /// Applies an asynchronously produced score to an already-recorded
    /// answer. Skipped once the session is terminal (completion has already
    /// backfilled a fallback) or when a score is already in place.
    pub fn apply_score(&mut self, answer_index: usize, score: u8, feedback: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match self.answers.get_mut(answer_index) {
            Some(answer) if answer.score.is_none() => {
                answer.score = Some(score.min(100));
                answer.feedback = Some(feedback);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2024-03-01T09:00:00Z".parse().expect("timestamp")
    }

    fn two_questions() -> Vec<Question> {
        vec![
            Question {
                id: "q1".into(),
                text: "Tell me about yourself.".into(),
                difficulty: crate::session::Difficulty::Easy,
                time_limit_seconds: 20,
                category: "Introduction".into(),
                ai_generated: false,
            },
            Question {
                id: "q2".into(),
                text: "Describe a challenging project.".into(),
                difficulty: crate::session::Difficulty::Medium,
                time_limit_seconds: 60,
                category: "Problem Solving".into(),
                ai_generated: false,
            },
        ]
    }

    fn session() -> InterviewSession {
        InterviewSession::start(Uuid::new_v4(), two_questions(), t0()).expect("start")
    }

    fn assert_invariants(sess: &InterviewSession) {
        assert!(sess.answers.len() <= sess.questions.len());
        if !sess.status.is_terminal() {
            assert_eq!(sess.current_question_index, sess.answers.len());
        }
    }

    #[test]
    fn starts_active_with_first_question_timer() {
        let sess = session();
        assert_eq!(sess.status, SessionStatus::Active);
        assert_eq!(sess.current_question().map(|q| q.id.as_str()), Some("q1"));
        assert_eq!(sess.remaining_seconds(t0()), 20);
        assert_invariants(&sess);
    }

    #[test]
    fn start_rejects_empty_question_list() {
        assert!(InterviewSession::start(Uuid::new_v4(), vec![], t0()).is_err());
    }

    #[test]
    fn submit_advances_and_restarts_the_timer() {
        let mut sess = session();
        let now = t0() + Duration::seconds(10);
        let outcome = sess
            .submit_answer("q1", "I am a developer.".into(), false, now)
            .expect("submit");

        assert_eq!(outcome.answer_index, 0);
        assert!(!outcome.all_answered);
        assert_eq!(sess.answers[0].time_spent_seconds, 10);
        assert_eq!(sess.answers[0].score, None);
        assert_eq!(sess.current_question().map(|q| q.id.as_str()), Some("q2"));
        // Fresh 60s timer for q2, pause accounting reset.
        assert_eq!(sess.remaining_seconds(now), 60);
        assert_eq!(sess.timer.total_paused_seconds, 0);
        assert_invariants(&sess);
    }

    #[test]
    fn submit_for_wrong_question_is_a_mismatch() {
        let mut sess = session();
        let err = sess
            .submit_answer("q2", "out of order".into(), false, t0())
            .expect_err("mismatch");
        assert!(matches!(err, SessionError::QuestionMismatch { .. }));
        // Rejected operations leave the session untouched.
        assert!(sess.answers.is_empty());
        assert_eq!(sess.current_question_index, 0);
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut sess = session();
        let now = t0() + Duration::seconds(5);
        sess.submit_answer("q1", "first".into(), false, now).expect("submit");
        let err = sess
            .submit_answer("q1", "again".into(), false, now)
            .expect_err("duplicate");
        assert!(matches!(err, SessionError::QuestionMismatch { .. }));
        assert_eq!(sess.answers.len(), 1);
    }

    #[test]
    fn submit_while_paused_is_invalid_then_resume_succeeds() {
        let mut sess = session();
        sess.pause(t0() + Duration::seconds(3)).expect("pause");

        let err = sess
            .submit_answer("q1", "too early".into(), false, t0() + Duration::seconds(4))
            .expect_err("paused");
        assert!(matches!(err, SessionError::InvalidState(SessionStatus::Paused)));

        sess.resume(t0() + Duration::seconds(60)).expect("resume");
        sess.submit_answer("q1", "now it works".into(), false, t0() + Duration::seconds(70))
            .expect("submit after resume");
        // 3s before the pause + 10s after the resume.
        assert_eq!(sess.answers[0].time_spent_seconds, 13);
    }

    #[test]
    fn pause_is_idempotent() {
        let mut sess = session();
        sess.pause(t0() + Duration::seconds(5)).expect("pause");
        sess.pause(t0() + Duration::seconds(500)).expect("second pause is a no-op");
        sess.resume(t0() + Duration::seconds(1000)).expect("resume");
        // Paused time counted from the first pause only.
        assert_eq!(sess.timer.total_paused_seconds, 995);
        assert_eq!(sess.remaining_seconds(t0() + Duration::seconds(1000)), 15);
    }

    #[test]
    fn resume_requires_paused() {
        let mut sess = session();
        let err = sess.resume(t0()).expect_err("not paused");
        assert!(matches!(err, SessionError::InvalidState(SessionStatus::Active)));
    }

    #[test]
    fn expire_before_the_deadline_is_rejected() {
        let mut sess = session();
        let err = sess
            .expire(String::new(), t0() + Duration::seconds(5))
            .expect_err("still running");
        assert!(matches!(err, SessionError::TimerStillRunning));
    }

    #[test]
    fn expire_records_the_full_limit_even_when_detected_late() {
        let mut sess = session();
        // Poll arrives 40s after a 20s deadline.
        let outcome = sess
            .expire("partial draft".into(), t0() + Duration::seconds(60))
            .expect("expire");
        assert!(!outcome.all_answered);
        let answer = &sess.answers[0];
        assert!(answer.auto_submitted);
        assert_eq!(answer.time_spent_seconds, 20);
        assert_eq!(answer.text, "partial draft");
        assert_invariants(&sess);
    }

    #[test]
    fn two_question_scenario_with_expiry_completes() {
        let mut sess = session();

        // Answer q1 at 10s elapsed.
        let now = t0() + Duration::seconds(10);
        sess.submit_answer("q1", "answer one".into(), false, now).expect("q1");
        assert_eq!(sess.remaining_seconds(now), 60);

        // Let q2's 60s timer expire without a submission.
        let late = now + Duration::seconds(75);
        let outcome = sess.expire(String::new(), late).expect("expire q2");
        assert!(outcome.all_answered);
        assert_eq!(sess.answers[1].time_spent_seconds, 60);
        assert!(sess.answers[1].auto_submitted);

        sess.complete(late).expect("complete");
        assert_eq!(sess.status, SessionStatus::Completed);
        let expected_mean = (sess.answers[0].score.unwrap() as f64
            + sess.answers[1].score.unwrap() as f64)
            / 2.0;
        assert_eq!(sess.final_score, Some(expected_mean));
        assert!(sess.answers.iter().all(|a| a.score.is_some()));
        assert!(sess.answers.len() == sess.questions.len());
    }

    #[test]
    fn complete_backfills_unscored_answers_with_a_valid_mean() {
        let mut sess = session();
        sess.submit_answer("q1", "abc".into(), false, t0() + Duration::seconds(4))
            .expect("q1");
        sess.submit_answer("q2", "a longer answer with quite a bit of detail in it".into(), false, t0() + Duration::seconds(40))
            .expect("q2");
        // No scorer ever responded.
        sess.complete(t0() + Duration::seconds(40)).expect("complete");

        let score = sess.final_score.expect("final score");
        assert!((0.0..=100.0).contains(&score));
        assert!(score.is_finite());
    }

    #[test]
    fn complete_twice_errors_and_never_recomputes() {
        let mut sess = session();
        sess.submit_answer("q1", "one".into(), false, t0() + Duration::seconds(2))
            .expect("q1");
        sess.complete(t0() + Duration::seconds(5)).expect("early completion");
        sess.record_summary("first summary".into());

        let first_score = sess.final_score;
        let err = sess.complete(t0() + Duration::seconds(6)).expect_err("terminal");
        assert!(matches!(err, SessionError::InvalidState(SessionStatus::Completed)));
        sess.record_summary("second summary".into());

        assert_eq!(sess.final_score, first_score);
        assert_eq!(sess.summary.as_deref(), Some("first summary"));
    }

    #[test]
    fn complete_with_no_answers_scores_zero() {
        let mut sess = session();
        sess.complete(t0()).expect("early termination");
        assert_eq!(sess.final_score, Some(0.0));
    }

    #[test]
    fn abandon_from_any_non_terminal_state() {
        let mut active = session();
        active.abandon(t0()).expect("abandon active");
        assert_eq!(active.status, SessionStatus::Abandoned);

        let mut paused = session();
        paused.pause(t0()).expect("pause");
        paused.abandon(t0() + Duration::seconds(9)).expect("abandon paused");
        assert_eq!(paused.status, SessionStatus::Abandoned);

        let err = active.abandon(t0()).expect_err("already terminal");
        assert!(matches!(err, SessionError::InvalidState(SessionStatus::Abandoned)));
    }

    #[test]
    fn operations_are_rejected_after_abandon() {
        let mut sess = session();
        sess.abandon(t0()).expect("abandon");
        assert!(sess.submit_answer("q1", "x".into(), false, t0()).is_err());
        assert!(sess.pause(t0()).is_err());
        assert!(sess.resume(t0()).is_err());
        assert!(sess.complete(t0()).is_err());
    }

    #[test]
    fn late_score_is_discarded_once_terminal() {
        let mut sess = session();
        sess.submit_answer("q1", "one".into(), false, t0() + Duration::seconds(2))
            .expect("q1");
        sess.complete(t0() + Duration::seconds(3)).expect("complete");

        let backfilled = sess.answers[0].score;
        assert!(!sess.apply_score(0, 99, "late".into()));
        assert_eq!(sess.answers[0].score, backfilled);
    }

    #[test]
    fn async_score_lands_on_the_recorded_answer() {
        let mut sess = session();
        sess.submit_answer("q1", "one".into(), false, t0() + Duration::seconds(2))
            .expect("q1");
        assert!(sess.apply_score(0, 87, "solid".into()));
        assert_eq!(sess.answers[0].score, Some(87));
        // A second delivery does not overwrite.
        assert!(!sess.apply_score(0, 12, "dup".into()));
        assert_eq!(sess.answers[0].score, Some(87));
    }

    #[test]
    fn serialized_session_reproduces_remaining_seconds() {
        let mut sess = session();
        sess.pause(t0() + Duration::seconds(6)).expect("pause");
        sess.resume(t0() + Duration::seconds(300)).expect("resume");

        let json = serde_json::to_string(&sess).expect("serialize");
        let restored: InterviewSession = serde_json::from_str(&json).expect("deserialize");

        let probe = t0() + Duration::seconds(305);
        assert_eq!(restored.remaining_seconds(probe), sess.remaining_seconds(probe));
        assert_eq!(restored.status, sess.status);
        assert_eq!(restored.current_question_index, sess.current_question_index);
    }

    #[test]
    fn progress_and_total_time_track_answers() {
        let mut sess = session();
        assert_eq!(sess.progress_percent(), 0);
        sess.submit_answer("q1", "one".into(), false, t0() + Duration::seconds(8))
            .expect("q1");
        assert_eq!(sess.progress_percent(), 50);
        assert_eq!(sess.total_time_seconds(), 8);
    }
}
