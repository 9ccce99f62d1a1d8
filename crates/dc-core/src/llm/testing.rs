//! Scripted in-process `GenAiService` for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;

use super::service::{GenAiService, TextStream};
use super::types::{FileMetadata, FileState, Message, Part};
use crate::{Error, Result};

/// One step of a scripted reply stream
pub(crate) enum Step {
    Text(String),
    Fail(String),
    /// Notify the test that the stream reached this point
    Signal(Arc<Notify>),
    /// Block until the test releases the stream
    Wait(Arc<Notify>),
}

impl Step {
    pub(crate) fn text(text: &str) -> Self {
        Step::Text(text.to_string())
    }

    pub(crate) fn fail(message: &str) -> Self {
        Step::Fail(message.to_string())
    }
}

type StreamCall = (Vec<Message>, Message);

#[derive(Default)]
pub(crate) struct FakeService {
    replies: Mutex<VecDeque<Vec<Step>>>,
    stream_calls: Mutex<Vec<StreamCall>>,
    /// Status sequence returned by successive `get_file` calls
    statuses: Mutex<VecDeque<FileMetadata>>,
    uploads: Mutex<Vec<String>>,
    fail_uploads: Mutex<Vec<String>>,
    title: Mutex<Option<Result<String>>>,
    title_calls: Mutex<usize>,
}

impl FakeService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue the steps for the next `stream_content` call
    pub(crate) fn push_reply(&self, steps: Vec<Step>) {
        self.replies.lock().unwrap().push_back(steps);
    }

    pub(crate) fn push_status(&self, name: &str, state: FileState, uri: Option<&str>) {
        self.statuses.lock().unwrap().push_back(FileMetadata {
            name: name.to_string(),
            display_name: None,
            mime_type: None,
            uri: uri.map(str::to_string),
            state,
        });
    }

    /// Make uploads of `display_name` fail
    pub(crate) fn fail_upload_of(&self, display_name: &str) {
        self.fail_uploads.lock().unwrap().push(display_name.to_string());
    }

    pub(crate) fn set_title(&self, title: Result<String>) {
        *self.title.lock().unwrap() = Some(title);
    }

    pub(crate) fn stream_calls(&self) -> Vec<StreamCall> {
        self.stream_calls.lock().unwrap().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub(crate) fn title_calls(&self) -> usize {
        *self.title_calls.lock().unwrap()
    }
}

#[async_trait]
impl GenAiService for FakeService {
    async fn stream_content(&self, history: &[Message], message: &Message) -> Result<TextStream> {
        self.stream_calls
            .lock()
            .unwrap()
            .push((history.to_vec(), message.clone()));

        let steps = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::GeminiApi("no scripted reply".to_string()))?;

        let stream = stream::unfold(VecDeque::from(steps), |mut steps| async move {
            loop {
                match steps.pop_front()? {
                    Step::Text(text) => return Some((Ok(text), steps)),
                    Step::Fail(message) => {
                        steps.clear();
                        return Some((Err(Error::GeminiApi(message)), steps));
                    }
                    Step::Signal(notify) => notify.notify_one(),
                    Step::Wait(notify) => notify.notified().await,
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        _data: Vec<u8>,
    ) -> Result<FileMetadata> {
        if self.fail_uploads.lock().unwrap().iter().any(|n| n == display_name) {
            return Err(Error::GeminiApi(format!("upload of {} rejected", display_name)));
        }
        self.uploads.lock().unwrap().push(display_name.to_string());
        Ok(FileMetadata {
            name: format!("files/{}", display_name),
            display_name: Some(display_name.to_string()),
            mime_type: Some(mime_type.to_string()),
            uri: None,
            state: FileState::Processing,
        })
    }

    async fn get_file(&self, name: &str) -> Result<FileMetadata> {
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| FileMetadata {
            name: name.to_string(),
            display_name: None,
            mime_type: None,
            uri: Some(format!("gs://x/{}", name.trim_start_matches("files/"))),
            state: FileState::Active,
        }))
    }

    async fn extract_title(&self, _file_part: &Part) -> Result<String> {
        *self.title_calls.lock().unwrap() += 1;
        match self.title.lock().unwrap().take() {
            Some(result) => result,
            None => Ok("Document".to_string()),
        }
    }
}
