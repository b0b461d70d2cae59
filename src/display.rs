use crate::config::Provider;
use crate::core::error::ChatError;
use console::style;
use std::io::{self, Write};
use termimad::MadSkin;

/// Greeting printed once when the session starts.
pub fn display_banner<W: Write>(
    out: &mut W,
    provider: Provider,
    model: &str,
    stream: bool,
) -> io::Result<()> {
    writeln!(
        out,
        "{} {} {}",
        style("schat").bold().magenta(),
        style(format!("{} · {}", provider, model)).dim(),
        style(if stream { "(streaming)" } else { "" }).dim()
    )?;
    writeln!(
        out,
        "Type '/help' for available commands. Press Ctrl+D or type /quit to exit."
    )?;
    out.flush()
}

pub fn display_notice<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "{}", text)?;
    out.flush()
}

/// Single-line diagnostic for a non-fatal error.
pub fn display_error<W: Write>(out: &mut W, err: &ChatError) -> io::Result<()> {
    let line = err.to_string().replace('\n', " ");
    writeln!(out, "{} {}", style("✗").bold().red(), style(line).red())?;
    out.flush()
}

/// Closes a streamed reply so the next prompt starts on a fresh line.
pub fn finish_stream<W: Write>(out: &mut W, streamed: &str) -> io::Result<()> {
    if !streamed.is_empty() && !streamed.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()
}

fn looks_like_markdown(response: &str) -> bool {
    response.contains("```")
        || response.contains('*')
        || response.contains('`')
        || response.contains('#')
}

/// Renders a complete (non-streamed) reply, through termimad when it
/// carries markdown.
pub fn display_response<W: Write>(out: &mut W, response: &str) -> io::Result<()> {
    if looks_like_markdown(response) {
        let skin = MadSkin::default();
        write!(out, "{}", skin.term_text(response))?;
    } else {
        writeln!(out, "{}", response)?;
    }
    out.flush()
}
