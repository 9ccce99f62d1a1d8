//! Conversation handle bound to a session's history

use std::sync::Arc;

use super::service::{GenAiService, TextStream};
use super::types::Message;
use crate::Result;

/// Live exchange with the remote model, seeded with prior history
#[derive(Clone)]
pub struct Conversation {
    service: Arc<dyn GenAiService>,
    history: Vec<Message>,
}

impl Conversation {
    /// Create a conversation whose remote context is `history`
    pub fn create(service: Arc<dyn GenAiService>, history: Vec<Message>) -> Self {
        Self { service, history }
    }

    /// History the next request will carry as context
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Stream the reply to `message`; the history is not changed
    pub async fn send_stream(&self, message: &Message) -> Result<TextStream> {
        self.service.stream_content(&self.history, message).await
    }

    /// Append a completed exchange so later requests see it
    pub fn record(&mut self, user: Message, model: Message) {
        self.history.push(user);
        self.history.push(model);
    }
}
