//! Error types for dc-core

use thiserror::Error;

/// Main error type for dc-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Gemini API error: {0}")]
    GeminiApi(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File {name} still processing after {attempts} status checks")]
    UploadTimeout { name: String, attempts: u32 },

    #[error("Files with unsupported types: {}. Only .pdf and .txt are allowed", .0.join(", "))]
    InvalidFileType(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for dc-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_file_type_lists_names() {
        let err = Error::InvalidFileType(vec!["virus.exe".to_string(), "image.png".to_string()]);
        let msg = err.to_string();
        assert!(msg.contains("virus.exe, image.png"));
        assert!(msg.contains(".pdf and .txt"));
    }

    #[test]
    fn test_upload_timeout_message() {
        let err = Error::UploadTimeout {
            name: "files/abc".to_string(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "File files/abc still processing after 3 status checks");
    }
}
