//! File-per-session JSON persistence, with an in-process cache to avoid
//! re-reading disk on every orchestrator call within the same run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::data::SessionData;
use crate::session::error::SessionError;

pub struct SessionStore {
    sessions_dir: PathBuf,
    cache: Arc<RwLock<HashMap<Uuid, SessionData>>>,
}

impl SessionStore {
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.sessions_dir.join(format!("{id}.json"))
    }

    pub async fn save(&self, data: &SessionData) -> Result<(), SessionError> {
        fs::create_dir_all(&self.sessions_dir).await?;

        let final_path = self.path_for(data.session_id);
        let tmp_path = final_path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(data).map_err(|source| SessionError::Serde {
            id: data.session_id.to_string(),
            source,
        })?;

        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &final_path).await?;

        self.cache.write().await.insert(data.session_id, data.clone());

        Ok(())
    }

    pub async fn load(&self, id: Uuid) -> Result<SessionData, SessionError> {
        if let Some(cached) = self.cache.read().await.get(&id) {
            return Ok(cached.clone());
        }

        let raw = fs::read_to_string(self.path_for(id))
            .await
            .map_err(|_| SessionError::NotFound(id.to_string()))?;

        let data: SessionData =
            serde_json::from_str(&raw).map_err(|source| SessionError::Serde {
                id: id.to_string(),
                source,
            })?;

        self.cache.write().await.insert(id, data.clone());

        Ok(data)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        self.cache.write().await.remove(&id);
        let path = self.path_for(id);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<Uuid>, SessionError> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = Uuid::parse_str(stem) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Most recently created sessions first, capped at `limit`.
    pub async fn get_recent_sessions(&self, limit: usize) -> Result<Vec<SessionData>, SessionError> {
        let mut all = Vec::new();
        for id in self.list_sessions().await? {
            if let Ok(data) = self.load(id).await {
                all.push(data);
            }
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }
}
