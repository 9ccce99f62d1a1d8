//! Local file validation and upload-then-poll flow

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mime::Mime;
use tracing::{debug, info, warn};

use super::PendingAttachment;
use crate::config::UploadConfig;
use crate::llm::{FileData, FileMetadata, FileState, GenAiService};
use crate::{Error, Result};

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// A local file that passed validation, with its contents
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: Mime,
    pub data: Vec<u8>,
}

/// Outcome of checking a batch of files
#[derive(Debug, Default)]
pub struct FileValidation {
    pub accepted: Vec<LocalFile>,
    /// Names of the files that were refused
    pub rejected: Vec<String>,
}

impl FileValidation {
    /// Error naming every rejected file, if any were rejected
    pub fn rejection(&self) -> Option<Error> {
        if self.rejected.is_empty() {
            None
        } else {
            Some(Error::InvalidFileType(self.rejected.clone()))
        }
    }
}

/// Guess the MIME type from the file contents
pub fn sniff_mime(data: &[u8]) -> Mime {
    if data.starts_with(b"%PDF-") {
        mime::APPLICATION_PDF
    } else if std::str::from_utf8(data).is_ok() {
        mime::TEXT_PLAIN
    } else {
        mime::APPLICATION_OCTET_STREAM
    }
}

fn extension_allowed(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn mime_allowed(mime_type: &Mime) -> bool {
    *mime_type == mime::APPLICATION_PDF || mime_type.essence_str() == mime::TEXT_PLAIN.essence_str()
}

/// Split `paths` into files that may be uploaded and names that may not.
///
/// A file is accepted when its extension is `.pdf` or `.txt` and its
/// contents look like a PDF or plain text. Unreadable files are rejected.
pub async fn validate_files<P: AsRef<Path>>(paths: &[P]) -> FileValidation {
    let mut validation = FileValidation::default();

    for path in paths {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        if !extension_allowed(&name) {
            debug!("Rejecting {}: extension not allowed", name);
            validation.rejected.push(name);
            continue;
        }

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Rejecting {}: {}", path.display(), e);
                validation.rejected.push(name);
                continue;
            }
        };

        let mime_type = sniff_mime(&data);
        if !mime_allowed(&mime_type) {
            debug!("Rejecting {}: content type {}", name, mime_type);
            validation.rejected.push(name);
            continue;
        }

        validation.accepted.push(LocalFile {
            path: path.to_path_buf(),
            name,
            mime_type,
            data,
        });
    }

    validation
}

/// Uploads files and waits until the service has processed them
pub struct Uploader {
    service: Arc<dyn GenAiService>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl Uploader {
    pub fn new(service: Arc<dyn GenAiService>, config: &UploadConfig) -> Self {
        Self {
            service,
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts.max(1),
        }
    }

    /// Upload one file and resolve it to a remote reference
    pub async fn upload(&self, file: &LocalFile) -> Result<PendingAttachment> {
        let uploaded = self
            .service
            .upload_file(&file.name, file.mime_type.essence_str(), file.data.clone())
            .await?;

        let ready = self.wait_until_active(&uploaded.name).await?;
        let uri = ready
            .uri
            .ok_or_else(|| Error::UploadFailed(format!("{} has no URI", ready.name)))?;

        info!("File {} ready at {}", file.name, uri);

        Ok(PendingAttachment::new(
            FileData {
                file_uri: uri,
                mime_type: file.mime_type.essence_str().to_string(),
            },
            file.name.clone(),
        ))
    }

    /// Upload every file in order. Fails as a whole on the first error.
    pub async fn upload_all(&self, files: &[LocalFile]) -> Result<Vec<PendingAttachment>> {
        let mut attachments = Vec::with_capacity(files.len());
        for file in files {
            attachments.push(self.upload(file).await?);
        }
        Ok(attachments)
    }

    async fn wait_until_active(&self, name: &str) -> Result<FileMetadata> {
        let mut attempts = 0;
        loop {
            let status = self.service.get_file(name).await?;
            attempts += 1;

            match status.state {
                FileState::Active => return Ok(status),
                FileState::Failed => {
                    return Err(Error::UploadFailed(format!("processing of {} failed", name)));
                }
                FileState::Processing | FileState::StateUnspecified => {}
            }

            if attempts >= self.max_poll_attempts {
                return Err(Error::UploadTimeout {
                    name: name.to_string(),
                    attempts,
                });
            }

            debug!("File {} still processing (check {})", name, attempts);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
