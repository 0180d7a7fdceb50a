//! Server-Sent Events decoding for streamed chat completions.
//!
//! `SseDecoder` turns arbitrary byte chunks into complete event payloads.
//! `fragment_stream` layers chunk parsing on top and yields text fragments
//! until `data: [DONE]` or end of body.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};

use super::types::ChatChunk;
use super::{FragmentStream, LlmError};

/// Sentinel payload that terminates an OpenAI event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE line decoder.
///
/// Buffers raw bytes so that lines (and multi-byte UTF-8 sequences) split
/// across network chunks are reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the payloads of every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.handle_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end of body: a trailing event without its blank line still counts.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.handle_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.data.push(data.to_string());
        }
        // `event:`, `id:`, `retry:` and `:` comments carry nothing we use
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

/// Parse one event payload into an optional text fragment.
pub fn parse_chunk(payload: &str) -> Result<Option<String>, LlmError> {
    let chunk: ChatChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::InvalidResponse(format!("bad stream chunk: {e}")))?;
    if let Some(err) = chunk.error {
        return Err(LlmError::StreamError(err.message));
    }
    Ok(chunk.fragment().map(str::to_string))
}

struct StreamState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Adapt a raw byte stream (an HTTP body) into a stream of text fragments.
///
/// Yields at most one error, after which the stream ends.
pub fn fragment_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = StreamState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                if payload.trim() == DONE_SENTINEL {
                    return None;
                }
                match parse_chunk(&payload) {
                    Ok(Some(text)) => return Some((Ok(text), st)),
                    Ok(None) => continue,
                    Err(e) => {
                        st.done = true;
                        st.pending.clear();
                        return Some((Err(e), st));
                    }
                }
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let events = st.decoder.push(bytes.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    });

    Box::pin(stream)
}
