//! Chat engine module
//!
//! Bridges a session's durable history and a live streaming conversation.

mod engine;
mod types;

pub use engine::ChatEngine;
pub use types::{ChatEvent, SendOutcome};
