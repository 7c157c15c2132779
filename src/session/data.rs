//! [`SessionData`] — the full persisted record for one orchestrated session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::state::{ConversationMessage, ErrorSeverity, MessageRole, SessionErrorRecord, SessionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub phases_completed: u32,
    pub qa_iterations: u32,
    pub tokens_used: u64,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            phases_completed: 0,
            qa_iterations: 0,
            tokens_used: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: Uuid,
    pub spec_id: String,
    pub task_description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: SessionStatus,
    pub phase: Option<String>,
    pub result: Option<String>,
    pub messages: Vec<ConversationMessage>,
    pub metrics: SessionMetrics,
    pub artifacts: std::collections::HashMap<String, String>,
    pub errors: Vec<SessionErrorRecord>,
}

impl SessionData {
    pub fn new(spec_id: impl Into<String>, task_description: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            spec_id: spec_id.into(),
            task_description: task_description.into(),
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            status: SessionStatus::Pending,
            phase: None,
            result: None,
            messages: Vec::new(),
            metrics: SessionMetrics::default(),
            artifacts: std::collections::HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(ConversationMessage::new(role, content));
    }

    pub fn get_duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(chrono::Utc::now);
        Some((end - started).num_milliseconds() as f64 / 1000.0)
    }

    /// Records an error; a `Fatal` severity forces the session into `Failed`
    /// regardless of what was happening before, mirroring how a single fatal
    /// failure in any phase aborts the whole session.
    pub fn record_error(&mut self, message: impl Into<String>, severity: ErrorSeverity) {
        let is_fatal = severity == ErrorSeverity::Fatal;
        self.errors.push(SessionErrorRecord {
            message: message.into(),
            severity,
            timestamp: chrono::Utc::now(),
        });
        if is_fatal {
            self.status = SessionStatus::Failed;
        }
    }
}
