//! Session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Message;

/// Represents a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Title shown in the session list
    pub title: String,
    /// Conversation messages
    pub history: Vec<Message>,
    /// Session creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a fresh id
    pub fn new(title: impl Into<String>, history: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            history,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the history
    pub fn set_history(&mut self, history: Vec<Message>) {
        self.history = history;
        self.updated_at = Utc::now();
    }

    /// Get message count
    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    /// Check if session is empty
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
