//! dc-core: Document Chat Core Library
//!
//! Gemini API との通信、セッションの永続化、添付ファイル管理、
//! ストリーミング応答を扱うチャットエンジンのコア機能を提供します。

pub mod attachments;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod session;
pub mod storage;

pub use attachments::{FileValidation, LocalFile, PendingAttachment, PendingAttachments, Uploader};
pub use chat::{ChatEngine, ChatEvent, SendOutcome};
pub use config::{ChatConfig, Config, LlmConfig, StorageBackend, StorageConfig, UploadConfig};
pub use error::{Error, Result};
pub use llm::{Conversation, FileData, GenAiService, GeminiClient, Message, Part, Role};
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, StoragePort};
