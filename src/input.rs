use crate::config::Config;
use crate::core::error::ChatError;

use console::style;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Context, EditMode, Editor, Helper};
use std::borrow::Cow;
use std::io::BufRead;
use std::path::PathBuf;

/// Result of waiting for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or end of piped input.
    Closed,
}

/// Where the session reads its lines from.
pub trait LineSource {
    /// Blocks until a line, an interrupt or the end of input. An `Err` means
    /// the source itself broke and is always `ChatError::FatalInput`.
    fn read_line(&mut self) -> Result<InputEvent, ChatError>;

    /// Called once when the session ends.
    fn finish(&mut self) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Completes slash commands and hints from input history.
pub struct ChatHelper {
    history_hinter: HistoryHinter,
    command_names: Vec<&'static str>,
}

impl ChatHelper {
    pub fn new(command_names: Vec<&'static str>) -> Self {
        Self {
            history_hinter: HistoryHinter {},
            command_names,
        }
    }
}

impl Helper for ChatHelper {}

impl ChatHelper {
    /// Command names starting with what follows the `/` up to the cursor.
    fn command_matches(&self, line: &str, pos: usize) -> Vec<Pair> {
        if pos == 0 {
            return Vec::new();
        }
        let Some(typed) = line.strip_prefix('/').and_then(|rest| rest.get(..pos - 1)) else {
            return Vec::new();
        };
        self.command_names
            .iter()
            .filter(|cmd| cmd.starts_with(typed))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect()
    }
}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // candidates replace everything after the '/'
        Ok((1, self.command_matches(line, pos)))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.history_hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(style(hint).dim().to_string())
    }
}

impl Validator for ChatHelper {}

/// Interactive terminal input with completion and persistent history.
pub struct EditorInput {
    editor: Editor<ChatHelper, FileHistory>,
    history_path: PathBuf,
}

impl EditorInput {
    pub fn new(command_names: Vec<&'static str>) -> Result<Self, ChatError> {
        let config = rustyline::Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(config)
            .map_err(|e| ChatError::FatalInput(format!("Failed to create line editor: {}", e)))?;
        editor.set_helper(Some(ChatHelper::new(command_names)));

        let history_path = Config::input_history_path();
        if let Err(e) = editor.load_history(&history_path) {
            tracing::debug!("no input history loaded from {}: {}", history_path.display(), e);
        }

        Ok(Self {
            editor,
            history_path,
        })
    }

    fn prompt() -> String {
        if cfg!(windows) && std::env::var("PSModulePath").is_ok() {
            "> ".to_string()
        } else {
            style("> ").bold().cyan().to_string()
        }
    }
}

impl LineSource for EditorInput {
    fn read_line(&mut self) -> Result<InputEvent, ChatError> {
        match self.editor.readline(&Self::prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                        tracing::warn!("failed to add history entry: {}", e);
                    }
                }
                Ok(InputEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Closed),
            Err(err) => Err(ChatError::FatalInput(err.to_string())),
        }
    }

    fn finish(&mut self) -> Result<(), ChatError> {
        if let Some(parent) = self.history_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.editor
            .save_history(&self.history_path)
            .map_err(|e| ChatError::Config(format!("Failed to save history: {}", e)))
    }
}

/// Line-at-a-time input from a pipe or file.
pub struct PipedInput<R> {
    reader: R,
}

impl<R: BufRead> PipedInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for PipedInput<R> {
    fn read_line(&mut self) -> Result<InputEvent, ChatError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(InputEvent::Closed),
            Ok(_) => Ok(InputEvent::Line(
                line.trim_end_matches(['\r', '\n']).to_string(),
            )),
            Err(e) => Err(ChatError::FatalInput(e.to_string())),
        }
    }
}
