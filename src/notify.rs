// src/notify.rs
//! Fire-and-forget lifecycle events. The notifier is injected into the
//! service rather than reached through a process-global handle; delivery is
//! best-effort and nothing in the session core waits on it.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: Uuid,
        candidate_id: Uuid,
        total_questions: usize,
    },
    TimerStarted {
        session_id: Uuid,
        question_id: String,
        time_limit_seconds: u32,
    },
    AnswerSubmitted {
        session_id: Uuid,
        question_id: String,
        auto_submitted: bool,
        is_complete: bool,
    },
    SessionPaused {
        session_id: Uuid,
    },
    SessionResumed {
        session_id: Uuid,
    },
    SessionCompleted {
        session_id: Uuid,
        final_score: f64,
    },
    SessionAbandoned {
        session_id: Uuid,
    },
}

pub trait Notifier: Send + Sync {
    fn publish(&self, event: &SessionEvent);
}

/// Default sink: structured log lines, one per event.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, event: &SessionEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(target: "intervue::events", "{}", payload),
            Err(e) => tracing::warn!("Failed to encode session event: {}", e),
        }
    }
}
