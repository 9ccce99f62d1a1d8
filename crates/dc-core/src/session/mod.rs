//! Session management module
//!
//! Provides session persistence and the active-session pointer.

mod store;
mod types;

pub use store::SessionStore;
pub use types::Session;
