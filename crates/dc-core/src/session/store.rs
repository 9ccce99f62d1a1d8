//! Session list persisted as one JSON blob

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::Message;
use crate::session::Session;
use crate::storage::{MemoryStorage, StoragePort};
use crate::{Error, Result};

/// Default storage key for the session list
pub const DEFAULT_SESSIONS_KEY: &str = "geminiChatSessions";

/// Ordered session list (most recent first) plus the active session id.
///
/// Every mutation re-serializes the whole list through the storage port.
/// When a write fails the in-memory change is kept and the error returned;
/// the next successful write brings storage back in line.
pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
    key: String,
    sessions: Vec<Session>,
    active_id: Option<String>,
}

impl SessionStore {
    /// Load the session list from `storage`.
    ///
    /// Missing, unreadable or malformed data yields an empty list.
    pub fn load(storage: Arc<dyn StoragePort>, key: impl Into<String>) -> Self {
        let key = key.into();

        let sessions = match storage.read(&key) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Session>>(&json) {
                Ok(sessions) => sessions,
                Err(e) => {
                    warn!("Ignoring malformed session data under {}: {}", key, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read session data under {}: {}", key, e);
                Vec::new()
            }
        };

        info!("Loaded {} sessions", sessions.len());
        let active_id = sessions.first().map(|s| s.id.clone());

        Self {
            storage,
            key,
            sessions,
            active_id,
        }
    }

    /// Create an empty store backed by memory (for testing)
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemoryStorage::new()), DEFAULT_SESSIONS_KEY)
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string(&self.sessions)?;
        self.storage.write(&self.key, &json).inspect_err(|e| {
            warn!("Failed to persist {} sessions: {}", self.sessions.len(), e);
        })?;
        debug!("Persisted {} sessions", self.sessions.len());
        Ok(())
    }

    /// All sessions, most recent first
    pub fn list(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Session> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    /// Point the active session at `id`, or at nothing
    pub fn set_active(&mut self, id: Option<&str>) -> Result<()> {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return Err(Error::SessionNotFound(id.to_string()));
            }
        }
        self.active_id = id.map(str::to_string);
        Ok(())
    }

    /// Insert a session at the front
    pub fn add(&mut self, session: Session) -> Result<()> {
        info!("Adding session {} ({})", session.id, session.title);
        self.sessions.insert(0, session);
        self.persist()
    }

    /// Replace the history of session `id`. Returns false if there is no such session.
    pub fn update(&mut self, id: &str, history: Vec<Message>) -> Result<bool> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            debug!("Update of unknown session {} ignored", id);
            return Ok(false);
        };
        session.set_history(history);
        self.persist()?;
        Ok(true)
    }

    /// Change the title of session `id`
    pub fn rename(&mut self, id: &str, title: impl Into<String>) -> Result<bool> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        session.title = title.into();
        self.persist()?;
        Ok(true)
    }

    /// Remove session `id`. If it was active, the first remaining session
    /// (or none) becomes active.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.sessions.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        self.sessions.remove(pos);

        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.sessions.first().map(|s| s.id.clone());
        }

        info!("Deleted session {}", id);
        self.persist()?;
        Ok(true)
    }
}
