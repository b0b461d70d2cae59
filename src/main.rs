use clap::Parser;
use console::style;
use is_terminal::IsTerminal;
use std::io::{self, BufReader};
use tokio::sync::watch;

mod cli;
mod commands;
mod config;
mod core;
mod display;
mod input;
mod logging;
mod providers;
mod session;
mod stream;
mod transcript;

use crate::cli::Args;
use crate::config::{Config, Provider};
use crate::core::error::ChatError;
use crate::input::{EditorInput, PipedInput};
use crate::providers::client::HttpTransport;
use crate::session::{ChatSession, SessionConfig, SessionOutcome};

/// Folds CLI overrides over the persisted config into the one explicit
/// configuration the session is built with.
fn build_session_config(args: &Args, config: &Config) -> Result<SessionConfig, ChatError> {
    let provider = match &args.provider {
        Some(name) => name.parse::<Provider>()?,
        None => config.active_provider.unwrap_or_default(),
    };

    let model = args
        .model
        .clone()
        .unwrap_or_else(|| config.model_for(provider));

    Ok(SessionConfig {
        provider,
        model,
        stream: config.stream && !args.no_stream,
        system_prompt: args.system.clone().or_else(|| config.system_prompt.clone()),
        provider_models: Provider::ALL
            .iter()
            .map(|&p| (p, config.model_for(p)))
            .collect(),
    })
}

async fn run(args: Args) -> Result<SessionOutcome, ChatError> {
    let config = Config::load()?;
    let session_config = build_session_config(&args, &config)?;
    tracing::info!(?session_config, "starting session");

    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    let transport = HttpTransport::new(config)?;
    let mut session =
        ChatSession::new(session_config, Box::new(transport), io::stdout(), interrupt_rx);

    if io::stdin().is_terminal() {
        let editor = EditorInput::new(session.command_names())?;
        session.run(editor).await
    } else {
        session.run(PipedInput::new(BufReader::new(io::stdin()))).await
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::setup_logging(args.verbose);

    let code = match run(args).await {
        Ok(SessionOutcome::Interrupted) => {
            println!("Exiting...");
            0
        }
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{} {}", style("Error:").bold().red(), e);
            1
        }
    };

    // a reader blocked on stdin after an interrupt is torn down here
    std::process::exit(code);
}
