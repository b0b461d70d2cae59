use crate::core::error::ChatError;
use crate::stream::ServiceUsage;
use crate::transcript::{Message, Role, Transcript, UsageEstimate};

use console::style;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct CommandInfo {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
}

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "help",
        usage: "/help",
        help: "Show available commands",
    },
    CommandInfo {
        name: "clear",
        usage: "/clear",
        help: "Clear conversation history (the system prompt is kept)",
    },
    CommandInfo {
        name: "provider",
        usage: "/provider [name]",
        help: "Show or switch the provider for the next turns",
    },
    CommandInfo {
        name: "model",
        usage: "/model [name]",
        help: "Show or change the model for the next turns",
    },
    CommandInfo {
        name: "tokens",
        usage: "/tokens",
        help: "Show the estimated token usage of the conversation",
    },
    CommandInfo {
        name: "history",
        usage: "/history",
        help: "Replay the conversation so far",
    },
    CommandInfo {
        name: "save",
        usage: "/save [filename]",
        help: "Save the conversation as JSON",
    },
    CommandInfo {
        name: "quit",
        usage: "/quit",
        help: "Exit the chat session",
    },
    CommandInfo {
        name: "exit",
        usage: "/exit",
        help: "Exit the chat session",
    },
];

pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    let mut lines = vec![style("Available Commands").bold().underlined().to_string()];
    for command in COMMANDS {
        lines.push(format!(
            "{} - {}",
            style(format!("{:width$}", command.usage, width = width)).cyan(),
            command.help
        ));
    }
    lines.join("\n")
}

/// Token usage as shown by `/tokens`.
pub fn tokens_report(
    transcript: &Transcript,
    last_reply: Option<UsageEstimate>,
    service_usage: Option<ServiceUsage>,
) -> String {
    let estimate = transcript.usage_estimate();
    let mut lines = vec![format!(
        "Conversation: ~{} tokens ({} messages, {} characters)",
        estimate.tokens, estimate.messages, estimate.characters
    )];
    if let Some(reply) = last_reply {
        lines.push(format!("Last reply:   ~{} tokens", reply.tokens));
    }
    if let Some(usage) = service_usage {
        lines.push(format!(
            "Reported:     {} prompt + {} completion = {} tokens",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        ));
    }
    lines.join("\n")
}

pub fn history_text(transcript: &Transcript) -> String {
    if transcript.is_empty() {
        return "No messages yet.".to_string();
    }
    transcript
        .messages()
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => style("System").bold().yellow(),
                Role::User => style("User").bold().green(),
                Role::Assistant => style("Assistant").bold().cyan(),
            };
            format!("{}: {}", role, msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Serialize)]
struct TranscriptFile<'a> {
    version: u8,
    messages: &'a [Message],
}

/// Writes the transcript to `dir/<filename>`, defaulting to a timestamped name.
pub fn save_transcript(
    transcript: &Transcript,
    dir: &Path,
    filename: Option<&str>,
) -> Result<PathBuf, ChatError> {
    let filename = match filename {
        Some(name) => name.to_string(),
        None => chrono::Local::now()
            .format("%Y%m%d_%H%M%S.json")
            .to_string(),
    };

    if Path::new(&filename).file_name() != Some(OsStr::new(&filename)) {
        return Err(ChatError::Validation(format!(
            "{} is not a plain file name; /save only writes into {}",
            filename,
            dir.display()
        )));
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);

    let file = File::create(&path)?;
    let contents = TranscriptFile {
        version: 1,
        messages: transcript.messages(),
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &contents)?;
    writer.flush()?;

    Ok(path)
}
