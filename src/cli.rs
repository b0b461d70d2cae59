use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive streaming chat in the terminal", long_about = None)]
pub struct Args {
    /// AI provider to use [possible values: openai, openrouter, deepseek]
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt that opens the conversation
    #[arg(short, long)]
    pub system: Option<String>,

    /// Wait for complete replies instead of streaming them
    #[arg(long)]
    pub no_stream: bool,

    /// Increase log verbosity (-v, -vv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
