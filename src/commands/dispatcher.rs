use super::{COMMAND_PREFIX, Command, handler};
use crate::core::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the next line.
    Idle,
    /// A command or chat round-trip is running.
    Processing,
}

/// Turns input lines into [`Command`]s.
///
/// Only one line is in flight at a time: `dispatch` moves to `Processing`
/// and the session calls `complete` once the line has been handled.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    state: DispatchState,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            state: DispatchState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn dispatch(&mut self, line: &str) -> Result<Command, ChatError> {
        if self.state == DispatchState::Processing {
            return Err(ChatError::Validation(
                "previous input is still being processed".to_string(),
            ));
        }

        let line = line.trim();
        if line.is_empty() {
            return Err(ChatError::Validation("empty input".to_string()));
        }

        let command = match line.strip_prefix(COMMAND_PREFIX) {
            Some(rest) => parse_command(rest),
            None => Command::ChatTurn(line.to_string()),
        };
        self.state = DispatchState::Processing;
        Ok(command)
    }

    pub fn complete(&mut self) {
        self.state = DispatchState::Idle;
    }

    /// Command names offered for completion.
    pub fn command_names(&self) -> Vec<&'static str> {
        handler::COMMANDS.iter().map(|c| c.name).collect()
    }
}

fn parse_command(rest: &str) -> Command {
    let (token, argument) = match rest.split_once(char::is_whitespace) {
        Some((token, argument)) => (token, argument.trim()),
        None => (rest, ""),
    };
    let argument = (!argument.is_empty()).then(|| argument.to_string());

    match (token.to_lowercase().as_str(), argument) {
        ("help" | "?", _) => Command::Help,
        ("exit" | "quit", _) => Command::Exit,
        ("clear", _) => Command::ClearHistory,
        ("provider", Some(name)) => Command::SwitchProvider(name),
        ("provider", None) => Command::ShowProvider,
        ("model", Some(name)) => Command::SwitchModel(name),
        ("model", None) => Command::ShowModel,
        ("tokens", _) => Command::ShowTokens,
        ("history", _) => Command::History,
        ("save", file) => Command::Save(file),
        _ => Command::UnknownCommand(token.to_string()),
    }
}
