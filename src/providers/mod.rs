use crate::config::Provider;
use crate::core::error::ChatError;
use crate::transcript::{Message, Role};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub mod client;

/// Raw wire chunks of a streaming reply, in receipt order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// Everything a single round-trip needs. Built from a transcript snapshot,
/// so later appends never reach a request already in flight.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub provider: Provider,
    pub model: String,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    /// Messages as sent on the wire: the system prompt is prepended unless
    /// the snapshot already starts with one.
    pub fn wire_messages(&self) -> Vec<Message> {
        let has_system = self
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System);
        match &self.system_prompt {
            Some(prompt) if !has_system => std::iter::once(Message::system(prompt.clone()))
                .chain(self.messages.iter().cloned())
                .collect(),
            _ => self.messages.clone(),
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Single round-trip returning the complete reply text.
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Starts a streaming reply and returns its undecoded chunks.
    async fn send_streaming(&self, request: &ChatRequest) -> Result<ChunkStream, ChatError>;
}
