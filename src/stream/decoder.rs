//! Line-oriented event-stream decoding.
//!
//! Chunks arrive with arbitrary boundaries: an event may span several chunks
//! and one chunk may carry several events. The decoder keeps the single
//! unterminated tail of the last chunk and only classifies lines once their
//! terminator has been seen.

use crate::core::error::ChatError;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Prefix of a content line. Case-sensitive, one trailing space.
pub const DATA_PREFIX: &str = "data: ";
/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const EVENT_PREFIX: &str = "event:";
const DEFAULT_EVENT_TYPE: &str = "message";

/// One decoded `data: ` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventRecord {
    pub event_type: String,
    pub raw_payload: String,
}

/// Stateful decoder for a single response stream. Never reuse across turns.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    event_type: Option<String>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the sentinel was seen or the stream was closed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds the next chunk and returns every record completed by it.
    ///
    /// Splitting on `\n` at the byte level is safe for UTF-8 input: the byte
    /// never occurs inside a multi-byte sequence.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<StreamEventRecord> {
        let mut records = Vec::new();
        if self.finished {
            return records;
        }

        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line = &buffer[consumed..consumed + offset];
            consumed += offset + 1;
            self.process_line(line, &mut records);
            if self.finished {
                return records;
            }
        }

        buffer.drain(..consumed);
        self.pending = buffer;
        records
    }

    /// Normal end of stream. A trailing line without terminator is still
    /// consumed.
    pub fn finish(&mut self) -> Vec<StreamEventRecord> {
        let mut records = Vec::new();
        if !self.finished && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.process_line(&line, &mut records);
        }
        self.finished = true;
        records
    }

    /// Transport failure. The tail was never terminated, so nothing can be
    /// assumed about it and it is dropped.
    pub fn abort(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                bytes = self.pending.len(),
                "discarding unterminated stream tail"
            );
        }
        self.pending.clear();
        self.finished = true;
    }

    fn process_line(&mut self, line: &[u8], records: &mut Vec<StreamEventRecord>) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = match std::str::from_utf8(line) {
            Ok(line) => line,
            Err(e) => {
                warn!("{}", ChatError::StreamDecode(format!("invalid UTF-8: {}", e)));
                return;
            }
        };

        if line.is_empty() {
            // blank line closes the current event
            self.event_type = None;
            return;
        }

        if let Some(event_type) = line.strip_prefix(EVENT_PREFIX) {
            self.event_type = Some(event_type.trim().to_string());
            return;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let payload = payload.trim();

        if payload.eq_ignore_ascii_case(DONE_SENTINEL) {
            self.finished = true;
            self.pending.clear();
            return;
        }
        if payload.is_empty() {
            return;
        }

        records.push(StreamEventRecord {
            event_type: self
                .event_type
                .clone()
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            raw_payload: payload.to_string(),
        });
    }
}

struct DecodeState<S> {
    chunks: S,
    decoder: FrameDecoder,
    ready: VecDeque<StreamEventRecord>,
    closed: bool,
}

/// Lazily decodes a chunk stream into records with a fresh decoder.
///
/// Records are yielded as soon as their line is complete. A chunk error is
/// yielded once and ends the sequence.
pub fn decode_stream<S>(chunks: S) -> BoxStream<'static, Result<StreamEventRecord, ChatError>>
where
    S: Stream<Item = Result<Bytes, ChatError>> + Send + Unpin + 'static,
{
    let state = DecodeState {
        chunks,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        closed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.ready.pop_front() {
                return Some((Ok(record), state));
            }
            if state.closed || state.decoder.is_finished() {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    let records = state.decoder.decode(&chunk);
                    state.ready.extend(records);
                }
                Some(Err(e)) => {
                    state.decoder.abort();
                    state.closed = true;
                    return Some((Err(e), state));
                }
                None => {
                    let records = state.decoder.finish();
                    state.ready.extend(records);
                    state.closed = true;
                }
            }
        }
    })
    .boxed()
}
