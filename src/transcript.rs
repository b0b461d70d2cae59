//! Conversation transcript sent as context on every request.
//!
//! The transcript is append-only until cleared. It holds at most one system
//! message, always at index 0, and only ever receives complete assistant
//! replies: streamed text is committed by the session after the stream ends.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Approximate token count: character length divided by 4, rounded up.
///
/// Advisory only. Nothing in the session makes decisions based on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageEstimate {
    pub messages: usize,
    pub characters: usize,
    pub tokens: usize,
}

impl UsageEstimate {
    pub fn of_text(text: &str) -> Self {
        let characters = text.chars().count();
        Self {
            messages: 1,
            characters,
            tokens: characters.div_ceil(4),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Creates a transcript, seeded with the system prompt when one is given.
    pub fn new(system_prompt: Option<&str>) -> Self {
        let mut transcript = Self::default();
        if let Some(prompt) = system_prompt {
            transcript.append(Message::system(prompt));
        }
        transcript
    }

    /// Appends a message in order.
    ///
    /// A system message never adds a second entry: it replaces the one at
    /// index 0, or is inserted there if the transcript has none yet.
    pub fn append(&mut self, message: Message) {
        if message.role != Role::System {
            self.messages.push(message);
            return;
        }
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => *first = message,
            _ => self.messages.insert(0, message),
        }
    }

    /// Empties the transcript, keeping the system message when asked and present.
    pub fn clear(&mut self, preserve_system_prompt: bool) {
        let system = match self.messages.first() {
            Some(first) if preserve_system_prompt && first.role == Role::System => {
                Some(first.clone())
            }
            _ => None,
        };
        self.messages.clear();
        self.messages.extend(system);
    }

    /// Owned copy of the ordered messages for a request already in flight.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Recomputed on every call from the current messages.
    pub fn usage_estimate(&self) -> UsageEstimate {
        let characters: usize = self
            .messages
            .iter()
            .map(|m| m.content.chars().count())
            .sum();
        UsageEstimate {
            messages: self.messages.len(),
            characters,
            tokens: characters.div_ceil(4),
        }
    }
}
