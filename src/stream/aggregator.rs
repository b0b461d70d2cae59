use crate::core::error::ChatError;
use crate::stream::decoder::StreamEventRecord;
use serde::Deserialize;
use std::io::Write;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ServiceUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: Option<String>,
}

/// Token counts the service reports on the final chunk when asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ServiceUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Default)]
struct Extracted {
    fragment: Option<String>,
    usage: Option<ServiceUsage>,
}

/// Pulls the content fragment (if any) out of one record.
///
/// A payload that is not a completion chunk is a `StreamDecode` error; an
/// in-band `error` object is a `StreamTransport` error.
fn extract(record: &StreamEventRecord) -> Result<Extracted, ChatError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(&record.raw_payload)
        .map_err(|e| ChatError::StreamDecode(format!("{}: {}", e, record.raw_payload)))?;

    if let Some(error) = chunk.error {
        return Err(ChatError::StreamTransport(
            error
                .message
                .unwrap_or_else(|| "service reported an error mid-stream".to_string()),
        ));
    }

    let fragment = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());

    Ok(Extracted {
        fragment,
        usage: chunk.usage,
    })
}

/// The assembled reply of one completed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedResponse {
    pub content: String,
    pub fragments: usize,
    pub skipped: usize,
    pub usage: Option<ServiceUsage>,
}

/// Folds fragments into the reply, writing each to the sink first.
///
/// The sink sees exactly the bytes that end up in `content`, in the same
/// order. One aggregator per stream.
#[derive(Debug, Default)]
pub struct DeltaAggregator {
    response: String,
    fragments: usize,
    skipped: usize,
    usage: Option<ServiceUsage>,
}

impl DeltaAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one record. Malformed records are logged and skipped.
    pub fn push<W: Write>(
        &mut self,
        record: &StreamEventRecord,
        sink: &mut W,
    ) -> Result<(), ChatError> {
        let extracted = match extract(record) {
            Ok(extracted) => extracted,
            Err(ChatError::StreamDecode(reason)) => {
                self.skipped += 1;
                warn!(event = %record.event_type, "skipping malformed stream record: {}", reason);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Some(usage) = extracted.usage {
            debug!(?usage, "service usage reported");
            self.usage = Some(usage);
        }

        if let Some(fragment) = extracted.fragment {
            sink.write_all(fragment.as_bytes())?;
            sink.flush()?;
            self.response.push_str(&fragment);
            self.fragments += 1;
        }
        Ok(())
    }

    /// Text accumulated so far.
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn finish(self) -> AggregatedResponse {
        AggregatedResponse {
            content: self.response,
            fragments: self.fragments,
            skipped: self.skipped,
            usage: self.usage,
        }
    }
}
