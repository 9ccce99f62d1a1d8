//! Gemini API client and types
//!
//! The rest of the crate talks to the remote model only through
//! [`GenAiService`], so the HTTP client can be swapped for a fake in tests.

mod client;
mod conversation;
mod service;
mod sse;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::GeminiClient;
pub use conversation::Conversation;
pub use service::{GenAiService, TextStream};
pub use types::*;
