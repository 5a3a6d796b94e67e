//! Server-sent-event framing and the unified chunk stream driver
//!
//! Providers stream `data:` lines separated by blank lines. Reads from the
//! network split those lines at arbitrary byte offsets (including inside a
//! multi-byte UTF-8 sequence), so the decoder buffers raw bytes and only
//! hands out complete lines.
//!
//! The driver turns a byte stream into [`StreamChunk`]s through a
//! provider-specific [`FrameTranslator`] and guarantees exactly one final
//! `done` chunk, whether the provider ends with `[DONE]`, a translator-level
//! stop event or a plain end of body.

use crate::core_types::messages::{StreamChunk, UnifiedResponse};
use crate::core_types::provider::ChunkStream;
use crate::error::{LlmError, LlmResult};
use crate::logging::{log_debug, log_trace};

use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// One decoded line of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line
    Data(String),
    /// `data: [DONE]`
    Done,
}

/// Incremental line decoder holding partial lines across reads.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and collect every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // event:, id:, retry: and comment lines carry nothing we need
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload == "[DONE]" {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(payload.to_string()))
    }
}

/// Result of translating one provider frame.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub delta: Option<UnifiedResponse>,
    /// The provider signalled the end of the stream in-band
    pub done: bool,
    /// The provider reported an error in-band
    pub error: Option<String>,
}

impl FrameOutcome {
    pub fn delta(delta: UnifiedResponse) -> Self {
        Self {
            delta: Some(delta),
            ..Default::default()
        }
    }

    pub fn skip() -> Self {
        Self::default()
    }

    pub fn stop() -> Self {
        Self {
            done: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Provider-specific translation of streamed frames.
pub trait FrameTranslator: Send + 'static {
    fn translate(&mut self, frame: serde_json::Value) -> FrameOutcome;

    /// Emit anything still buffered (e.g. partially streamed tool calls)
    /// before the final chunk.
    fn finish(&mut self) -> Option<UnifiedResponse> {
        None
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

/// Drive an HTTP response body as a unified chunk stream.
pub fn chunk_stream<T: FrameTranslator>(
    provider: impl Into<String>,
    response: reqwest::Response,
    translator: T,
    cancel: Option<CancellationToken>,
) -> ChunkStream {
    let body = response.bytes_stream().map(|r| r.map(|b| b.to_vec()));
    chunk_stream_from_bytes(provider, Box::pin(body), translator, cancel)
}

/// Same as [`chunk_stream`] over an arbitrary byte stream.
pub fn chunk_stream_from_bytes<T: FrameTranslator>(
    provider: impl Into<String>,
    body: ByteStream,
    translator: T,
    cancel: Option<CancellationToken>,
) -> ChunkStream {
    let state = DriverState {
        provider: provider.into(),
        body: Some(body),
        decoder: SseLineDecoder::new(),
        translator,
        pending: VecDeque::new(),
        cancel,
        finished: false,
        cancel_reported: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        let item = state.next_item().await?;
        Some((item, state))
    }))
}

struct DriverState<T> {
    provider: String,
    body: Option<ByteStream>,
    decoder: SseLineDecoder,
    translator: T,
    pending: VecDeque<LlmResult<StreamChunk>>,
    cancel: Option<CancellationToken>,
    finished: bool,
    cancel_reported: bool,
}

impl<T: FrameTranslator> DriverState<T> {
    async fn next_item(&mut self) -> Option<LlmResult<StreamChunk>> {
        loop {
            // Chunks decoded before cancellation are not delivered after it
            if self.cancel_requested() && !(self.finished && self.pending.is_empty()) {
                log_debug!(
                    provider = %self.provider,
                    discarded = self.pending.len(),
                    "Stream cancelled by caller"
                );
                self.pending.clear();
                self.abort(LlmError::cancelled(&self.provider));
            }
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }

            let read = self.read_body().await;
            match read {
                BodyRead::Bytes(bytes) => {
                    let events = self.decoder.push(&bytes);
                    self.handle_events(events);
                }
                BodyRead::End => {
                    let events = self.decoder.finish();
                    self.handle_events(events);
                    if !self.finished {
                        self.complete();
                    }
                }
                BodyRead::Failed(error) => {
                    let message = format!("Stream read failed: {error}");
                    self.abort(LlmError::network(&self.provider, message, Some(Box::new(error))));
                }
                BodyRead::Cancelled => {
                    // Reported at the top of the loop
                }
            }
        }
    }

    fn cancel_requested(&mut self) -> bool {
        if self.cancel_reported {
            return false;
        }
        let cancelled = self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
        if cancelled {
            self.cancel_reported = true;
        }
        cancelled
    }

    async fn read_body(&mut self) -> BodyRead {
        let Some(body) = self.body.as_mut() else {
            return BodyRead::End;
        };

        let next = match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return BodyRead::Cancelled,
                next = body.next() => next,
            },
            None => body.next().await,
        };

        match next {
            Some(Ok(bytes)) => BodyRead::Bytes(bytes),
            Some(Err(error)) => BodyRead::Failed(error),
            None => BodyRead::End,
        }
    }

    fn handle_events(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                break;
            }
            match event {
                SseEvent::Done => self.complete(),
                SseEvent::Data(payload) => self.handle_frame(&payload),
            }
        }
    }

    fn handle_frame(&mut self, payload: &str) {
        let frame = match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(frame) => frame,
            Err(e) => {
                log_debug!(
                    provider = %self.provider,
                    error = %e,
                    "Skipping undecodable stream frame"
                );
                return;
            }
        };
        log_trace!(provider = %self.provider, "Stream frame received");

        let outcome = self.translator.translate(frame);
        if let Some(message) = outcome.error {
            self.abort(LlmError::provider_error(&self.provider, message, None));
            return;
        }
        if let Some(delta) = outcome.delta {
            if !delta.is_empty() {
                self.pending.push_back(Ok(StreamChunk::delta(delta)));
            }
        }
        if outcome.done {
            self.complete();
        }
    }

    fn complete(&mut self) {
        if let Some(delta) = self.translator.finish() {
            if !delta.is_empty() {
                self.pending.push_back(Ok(StreamChunk::delta(delta)));
            }
        }
        self.pending.push_back(Ok(StreamChunk::done()));
        self.finished = true;
        self.body = None;
    }

    fn abort(&mut self, error: LlmError) {
        self.pending.push_back(Err(error));
        self.finished = true;
        // Dropping the body closes the connection
        self.body = None;
    }
}

enum BodyRead {
    Bytes(Vec<u8>),
    End,
    Failed(reqwest::Error),
    Cancelled,
}
