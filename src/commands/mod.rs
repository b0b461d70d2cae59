pub mod dispatcher;
pub mod handler;

pub use dispatcher::CommandDispatcher;

/// Prefix that marks an input line as an in-session command.
pub const COMMAND_PREFIX: char = '/';

/// What one line of input asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    ClearHistory,
    ShowProvider,
    SwitchProvider(String),
    ShowModel,
    SwitchModel(String),
    ShowTokens,
    History,
    Save(Option<String>),
    UnknownCommand(String),
    ChatTurn(String),
}
