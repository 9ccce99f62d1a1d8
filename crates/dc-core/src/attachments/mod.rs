//! Pending attachments and the upload flow that produces them

mod upload;

pub use upload::{FileValidation, LocalFile, Uploader, sniff_mime, validate_files};

use crate::llm::{FileData, Part};

/// A file uploaded and resolved to a remote reference, not yet sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub file: FileData,
    pub display_name: String,
}

impl PendingAttachment {
    pub fn new(file: FileData, display_name: impl Into<String>) -> Self {
        Self {
            file,
            display_name: display_name.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.file.file_uri
    }

    /// Message part referencing the remote file
    pub fn part(&self) -> Part {
        Part::File {
            file_data: self.file.clone(),
        }
    }
}

/// Files waiting to be attached to the next outgoing message.
///
/// Only holds files that finished uploading; does no I/O itself.
#[derive(Debug, Clone, Default)]
pub struct PendingAttachments {
    items: Vec<PendingAttachment>,
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attachments: impl IntoIterator<Item = PendingAttachment>) {
        self.items.extend(attachments);
    }

    /// Remove the item referencing `uri`. Returns false if none matched.
    pub fn remove(&mut self, uri: &str) -> bool {
        match self.items.iter().position(|a| a.uri() == uri) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAttachment> {
        self.items.iter()
    }

    pub fn parts(&self) -> Vec<Part> {
        self.items.iter().map(PendingAttachment::part).collect()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.items.iter().map(|a| a.display_name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str) -> PendingAttachment {
        PendingAttachment::new(
            FileData {
                file_uri: format!("gs://x/{}", name),
                mime_type: "text/plain".to_string(),
            },
            name,
        )
    }

    #[test]
    fn test_add_and_list() {
        let mut pending = PendingAttachments::new();
        pending.add(vec![attachment("a.txt"), attachment("b.txt")]);

        assert_eq!(pending.len(), 2);
        assert_eq!(pending.display_names(), vec!["a.txt", "b.txt"]);
        assert_eq!(pending.parts()[0], Part::file("gs://x/a.txt", "text/plain"));
    }

    #[test]
    fn test_remove_by_uri() {
        let mut pending = PendingAttachments::new();
        pending.add(vec![attachment("a.txt"), attachment("b.txt")]);

        assert!(pending.remove("gs://x/a.txt"));
        assert_eq!(pending.display_names(), vec!["b.txt"]);

        assert!(!pending.remove("gs://x/missing.txt"));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut pending = PendingAttachments::new();
        pending.add(vec![attachment("a.txt")]);
        pending.clear();
        assert!(pending.is_empty());
        assert!(pending.parts().is_empty());
    }
}
