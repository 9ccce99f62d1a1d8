//! Gemini API HTTP Client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::service::{GenAiService, TextStream};
use super::sse;
use super::types::*;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const TITLE_PROMPT: &str = "Please read this document and return a short title for it \
    as JSON with a single field named title.";

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &Config) -> Result<Self> {
        let llm_config = &config.llm;
        if llm_config.api_key.is_empty() {
            return Err(Error::Config("Gemini API key is not configured".to_string()));
        }

        // streamed replies are not bounded by a request timeout
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::Http)?;

        let base_url = llm_config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            api_key: llm_config.api_key.clone(),
            model: llm_config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create with custom base URL (for testing or custom endpoints)
    pub fn with_base_url(config: &Config, base_url: String) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("x-goog-api-key", &self.api_key)
    }

    /// Map a non-success response to `Error::GeminiApi`
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("Gemini API error: {} - {}", status, body);
        Err(Error::GeminiApi(format!("{}: {}", status, body)))
    }

    /// Non-streaming `generateContent`
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!("Sending request to Gemini API: {}", url);

        let response = self
            .authed(self.client.post(&url))
            .timeout(Duration::from_secs(120))
            .json(request)
            .send()
            .await?;
        let body = Self::check_status(response).await?.text().await?;

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            Error::GeminiApi(format!("Failed to parse response: {} - {}", e, body))
        })?;

        if let Some(reason) = parsed.block_reason() {
            return Err(Error::GeminiApi(format!("prompt blocked: {}", reason)));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl GenAiService for GeminiClient {
    async fn stream_content(&self, history: &[Message], message: &Message) -> Result<TextStream> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );

        let request = GenerateContentRequest {
            contents: history
                .iter()
                .chain(std::iter::once(message))
                .map(Message::to_content)
                .collect(),
            generation_config: None,
        };

        debug!(
            "Streaming from Gemini API: {} ({} context messages)",
            url,
            history.len()
        );

        let response = self
            .authed(self.client.post(&url))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(sse::text_stream(body))
    }

    /// Resumable upload: start a session, then send the bytes and finalize
    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<FileMetadata> {
        let start_url = format!("{}/upload/v1beta/files", self.base_url);
        let metadata = serde_json::json!({ "file": { "display_name": display_name } });

        let response = self
            .authed(self.client.post(&start_url))
            .timeout(Duration::from_secs(120))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&metadata)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::GeminiApi("upload session URL missing".to_string()))?;

        let size = data.len();
        let response = self
            .authed(self.client.post(&upload_url))
            .timeout(Duration::from_secs(300))
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await?;
        let body = Self::check_status(response).await?.text().await?;

        let uploaded: UploadFileResponse = serde_json::from_str(&body).map_err(|e| {
            Error::GeminiApi(format!("Failed to parse upload response: {} - {}", e, body))
        })?;

        info!(
            "Uploaded {} ({} bytes) as {}",
            display_name, size, uploaded.file.name
        );

        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> Result<FileMetadata> {
        let url = format!("{}/v1beta/{}", self.base_url, name);

        let response = self
            .authed(self.client.get(&url))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let body = Self::check_status(response).await?.text().await?;

        let file: FileMetadata = serde_json::from_str(&body).map_err(|e| {
            Error::GeminiApi(format!("Failed to parse file status: {} - {}", e, body))
        })?;
        debug!("File {} state: {:?}", file.name, file.state);

        Ok(file)
    }

    async fn extract_title(&self, file_part: &Part) -> Result<String> {
        #[derive(Deserialize)]
        struct TitleResponse {
            title: String,
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Role::User,
                parts: vec![Part::text(TITLE_PROMPT), file_part.clone()],
            }],
            generation_config: Some(GenerationConfig::json(serde_json::json!({
                "type": "OBJECT",
                "properties": { "title": { "type": "STRING" } },
                "propertyOrdering": ["title"]
            }))),
        };

        let response = self.generate_content(&request).await?;
        let text = response.text();

        match serde_json::from_str::<TitleResponse>(&text) {
            Ok(parsed) => Ok(parsed.title),
            Err(e) => {
                debug!("Could not parse title response {:?}: {}", text, e);
                Ok(String::new())
            }
        }
    }
}
