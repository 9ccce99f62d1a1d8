//! Chat engine events and results

use crate::Error;

/// Progress of a send, for streaming display.
///
/// `session_id` is the session the send targets; `None` means the reply will
/// start a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Started {
        session_id: Option<String>,
    },
    /// A fragment that was applied to the visible history
    Delta {
        session_id: Option<String>,
        text: String,
    },
    /// The exchange was committed to `session_id`
    Finished {
        session_id: String,
    },
    Failed {
        session_id: Option<String>,
        error: String,
    },
}

/// Result of `ChatEngine::send_message`
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input, nothing was sent
    Skipped,
    /// The reply completed and the exchange was persisted
    Committed { session_id: String, reply: String },
    /// The request or stream failed; durable history is unchanged
    Failed { error: Error },
}

impl SendOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SendOutcome::Committed { .. })
    }
}
