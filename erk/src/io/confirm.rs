//! User confirmations during validation.
//!
//! Only validation contexts carry a [`Confirm`] implementation; execution
//! contexts have no way to prompt.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{Context, Result, anyhow};

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on stderr and reads an answer from stdin.
pub struct ConsoleConfirm;

impl Confirm for ConsoleConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Err(anyhow!(
                "confirmation required but stdin is not a terminal (pass --force to skip)"
            ));
        }
        let mut stderr = std::io::stderr();
        write!(stderr, "{question} [y/N] ").context("write prompt")?;
        stderr.flush().context("flush prompt")?;

        let mut input = String::new();
        stdin.lock().read_line(&mut input).context("read answer")?;
        Ok(parse_answer(&input))
    }
}

/// Answers every question with `yes`; used when `--force` is set.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
