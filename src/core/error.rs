use std::io;
use thiserror::Error;

/// Unified error type for the chat session
#[derive(Error, Debug)]
pub enum ChatError {
    /// Empty or whitespace-only input line
    #[error("Input error: {0}")]
    Validation(String),

    /// Slash command that no handler recognizes
    #[error("Unknown command: /{0} (type /help for the command list)")]
    UnknownCommand(String),

    /// A single stream record that could not be decoded
    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    /// The chunk stream failed mid-response
    #[error("Stream error: {0}")]
    StreamTransport(String),

    /// The remote call itself failed (connect, status, body)
    #[error("API error: {0}")]
    Call(String),

    /// The input source is gone; the session cannot continue
    #[error("Input closed: {0}")]
    FatalInput(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChatError {
    /// Only a lost input source ends the session; everything else is reported
    /// at the turn boundary and the loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::FatalInput(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Call(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ChatError::Call(format!("Connection failed: {}", err))
        } else if err.is_status() {
            ChatError::Call(format!("API returned error status: {}", err))
        } else {
            ChatError::Call(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for ChatError {
    fn from(err: serde_yml::Error) -> Self {
        ChatError::Serialization(format!("YAML error: {}", err))
    }
}
