//! Remote generative-AI service trait

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::{FileMetadata, Message, Part};
use crate::Result;

/// Lazy sequence of reply fragments, in arrival order
pub type TextStream = BoxStream<'static, Result<String>>;

/// Operations consumed from the generative-AI service
#[async_trait]
pub trait GenAiService: Send + Sync {
    /// Send `message` after `history` and stream the reply text
    async fn stream_content(&self, history: &[Message], message: &Message) -> Result<TextStream>;

    /// Upload raw file bytes; the returned file is usually still processing
    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<FileMetadata>;

    /// Current status of an uploaded file
    async fn get_file(&self, name: &str) -> Result<FileMetadata>;

    /// Ask the model for a short title summarizing a document.
    /// Returns an empty string when the model reply cannot be parsed.
    async fn extract_title(&self, file_part: &Part) -> Result<String>;
}
