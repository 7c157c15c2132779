//! Drives one session's lifecycle: creation, phase transitions, pause/resume,
//! and timeout sweeps. Mutating access to a given session is serialized
//! through a lock keyed by session id, so two concurrent callers (e.g. a
//! progress callback and a phase-completion handler) can't race on the same
//! session's state while unrelated sessions run fully in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::data::SessionData;
use crate::session::error::SessionError;
use crate::session::state::{ErrorSeverity, MessageRole, SessionStatus};
use crate::session::store::SessionStore;

/// Terminal states are absorbing: no operation that mutates session state may
/// run once a session has reached `completed`, `failed`, or `cancelled`.
fn reject_if_terminal(data: &SessionData) -> Result<(), SessionError> {
    if data.status.is_terminal() {
        return Err(SessionError::InvalidTransition(
            data.session_id.to_string(),
            format!("{:?}", data.status),
        ));
    }
    Ok(())
}

pub struct SessionOrchestrator {
    store: SessionStore,
    active: Mutex<HashSet<Uuid>>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionOrchestrator {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            active: Mutex::new(HashSet::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    pub async fn create_session(
        &self,
        spec_id: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Result<SessionData, SessionError> {
        let data = SessionData::new(spec_id, task_description);
        self.store.save(&data).await?;
        Ok(data)
    }

    pub async fn get_session(&self, id: Uuid) -> Result<SessionData, SessionError> {
        self.store.load(id).await
    }

    /// Starts a session. Only `Pending` or `Paused` sessions may start —
    /// anything else (already running, already terminal) is rejected rather
    /// than silently re-entered.
    pub async fn start_session(&self, id: Uuid) -> Result<SessionData, SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        if !matches!(data.status, SessionStatus::Pending | SessionStatus::Paused) {
            return Err(SessionError::InvalidTransition(
                id.to_string(),
                format!("{:?}", data.status),
            ));
        }

        data.status = SessionStatus::Running;
        if data.started_at.is_none() {
            data.started_at = Some(Utc::now());
        }
        self.store.save(&data).await?;
        self.active.lock().await.insert(id);

        info!("session {} started", id);
        Ok(data)
    }

    pub async fn update_session_phase(
        &self,
        id: Uuid,
        phase: impl Into<String>,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        reject_if_terminal(&data)?;
        data.phase = Some(phase.into());
        self.store.save(&data).await
    }

    pub async fn add_agent_message(
        &self,
        id: Uuid,
        content: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.add_message(id, MessageRole::Agent, content).await
    }

    pub async fn add_user_message(
        &self,
        id: Uuid,
        content: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.add_message(id, MessageRole::User, content).await
    }

    async fn add_message(
        &self,
        id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        reject_if_terminal(&data)?;
        data.add_message(role, content);
        self.store.save(&data).await
    }

    /// Records an error against the session. A `Fatal` severity forces the
    /// session to `Failed` and removes it from the active set.
    pub async fn record_error(
        &self,
        id: Uuid,
        message: impl Into<String>,
        severity: ErrorSeverity,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        reject_if_terminal(&data)?;
        data.record_error(message, severity);
        let became_fatal = data.status == SessionStatus::Failed;
        self.store.save(&data).await?;

        if became_fatal {
            self.active.lock().await.remove(&id);
        }
        Ok(())
    }

    pub async fn complete_session(
        &self,
        id: Uuid,
        result: impl Into<String>,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        reject_if_terminal(&data)?;
        data.status = SessionStatus::Completed;
        data.completed_at = Some(Utc::now());
        data.result = Some(result.into());
        self.store.save(&data).await?;
        self.active.lock().await.remove(&id);
        Ok(())
    }

    pub async fn fail_session(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        reject_if_terminal(&data)?;
        data.status = SessionStatus::Failed;
        data.completed_at = Some(Utc::now());
        data.result = Some(reason.into());
        self.store.save(&data).await?;
        self.active.lock().await.remove(&id);
        Ok(())
    }

    pub async fn pause_session(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut data = self.store.load(id).await?;
        reject_if_terminal(&data)?;
        data.status = SessionStatus::Paused;
        data.add_message(MessageRole::System, format!("paused: {}", reason.into()));
        self.store.save(&data).await?;
        self.active.lock().await.remove(&id);
        Ok(())
    }

    pub async fn resume_session(&self, id: Uuid) -> Result<SessionData, SessionError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let data = self.store.load(id).await?;
        if data.status != SessionStatus::Paused {
            return Err(SessionError::InvalidTransition(
                id.to_string(),
                format!("{:?}", data.status),
            ));
        }
        drop(_guard);

        self.start_session(id).await
    }

    pub async fn get_active_sessions(&self) -> Vec<Uuid> {
        self.active.lock().await.iter().copied().collect()
    }

    /// Force-fails any active session whose `started_at` is older than
    /// `max_age_hours`, recording "Session timed out" as its result.
    pub async fn cleanup_stale_sessions(&self, max_age_hours: i64) -> Result<usize, SessionError> {
        let active: Vec<Uuid> = self.get_active_sessions().await;
        let mut cleaned = 0;

        for id in active {
            let data = self.store.load(id).await?;
            let Some(started) = data.started_at else {
                continue;
            };
            let age_hours = (Utc::now() - started).num_hours();
            if age_hours >= max_age_hours {
                warn!("session {} timed out after {}h, force-failing", id, age_hours);
                self.fail_session(id, "Session timed out").await?;
                cleaned += 1;
            }
        }

        Ok(cleaned)
    }
}
