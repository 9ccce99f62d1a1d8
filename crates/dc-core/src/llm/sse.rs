//! Server-sent events decoding for `streamGenerateContent?alt=sse`

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use super::service::TextStream;
use super::types::GenerateContentResponse;
use crate::{Error, Result};

/// Incremental SSE decoder yielding the `data` payload of each event
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk of bytes, returning the payloads of completed events
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // comments and other fields are ignored
        }

        events
    }

    /// Flush an event left unterminated at end of stream
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest);
            if let Some(data) = line.trim_end_matches('\r').strip_prefix("data:") {
                self.data.push(data.trim_start().to_string());
            }
        }
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

/// Parse one streamed event into its text fragment
pub(crate) fn parse_event(payload: &str) -> Result<String> {
    let chunk: GenerateContentResponse = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        return Err(Error::GeminiApi(format!("{}: {}", error.code, error.message)));
    }
    if let Some(reason) = chunk.block_reason() {
        return Err(Error::GeminiApi(format!("prompt blocked: {}", reason)));
    }
    Ok(chunk.text())
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    queue: VecDeque<Result<String>>,
    done: bool,
}

/// Turn a raw SSE body into a stream of text fragments.
/// The stream ends after the first error.
pub(crate) fn text_stream(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        queue: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.queue.pop_front() {
                if item.is_err() {
                    st.queue.clear();
                    st.done = true;
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    for payload in st.decoder.push(&chunk) {
                        st.queue.push_back(parse_event(&payload));
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    st.queue.push_back(Err(Error::Http(e)));
                }
                None => {
                    st.done = true;
                    if let Some(payload) = st.decoder.finish() {
                        debug!("Flushing unterminated SSE event");
                        st.queue.push_back(parse_event(&payload));
                    }
                }
            }
        }
    })
    .boxed()
}
