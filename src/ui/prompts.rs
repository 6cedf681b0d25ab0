//! ui::prompts
//!
//! Interactive confirmations.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode. In non-interactive mode,
//! operations requiring user input must either have defaults or fail
//! with a clear error message.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Prompt for confirmation (yes/no).
///
/// Returns `Ok(true)` if the user confirms, `Ok(false)` if they
/// decline. An empty answer takes the default; anything that is not a
/// recognized "yes" declines.
pub fn confirm(message: &str, default: bool, interactive: bool) -> Result<bool, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }

    let suffix = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", message, suffix);
    io::stdout()
        .flush()
        .map_err(|e| PromptError::IoError(e.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PromptError::IoError(e.to_string()))?;

    Ok(parse_answer(&line, default))
}

/// Interpret a typed answer.
fn parse_answer(line: &str, default: bool) -> bool {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_mode_is_an_error() {
        let result = confirm("Continue?", false, false);
        assert!(matches!(result, Err(PromptError::NotInteractive)));
    }

    #[test]
    fn empty_answer_takes_default() {
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("\n", false));
    }

    #[test]
    fn yes_variants_confirm() {
        assert!(parse_answer("y\n", false));
        assert!(parse_answer("YES\n", false));
    }

    #[test]
    fn anything_else_declines() {
        assert!(!parse_answer("n\n", true));
        assert!(!parse_answer("nope\n", true));
        assert!(!parse_answer("q\n", true));
    }
}
