//! Operator-facing terminal output and the run/skip confirmation.
//!
//! Every method takes its reader and writer as parameters so the session
//! driver can be tested with in-memory streams.

use crate::executor::ExecutionOutcome;
use crate::history::HistoryEntry;
use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::info;

/// The operator's answer to "run this command?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Run,
    Skip,
}

impl Confirmation {
    /// `y` or `yes` (any case) runs the command; anything else skips it.
    pub fn from_answer(answer: &str) -> Self {
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
            Confirmation::Run
        } else {
            Confirmation::Skip
        }
    }
}

/// Whether an input line asks to leave the interactive loop.
pub fn is_exit_directive(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Prompts and messages shown to the operator.
#[derive(Debug, Default)]
pub struct ConfirmationUI;

impl ConfirmationUI {
    pub fn new() -> Self {
        Self
    }

    /// Prints the banner for the interactive loop, naming the model in use.
    pub fn show_banner_with_io<W: Write>(&self, model: &str, output: &mut W) -> Result<()> {
        writeln!(output, "🔥 hearth ({})", model)?;
        writeln!(output, "Describe what you want to do. Type 'exit' or 'quit' to leave.")?;
        Ok(())
    }

    /// Prompts for the next request.
    ///
    /// Returns `None` at end of input. The returned line is not trimmed.
    pub fn read_request_with_io<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<String>> {
        write!(output, "\nhearth> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Shows the candidate command.
    pub fn show_suggestion_with_io<W: Write>(&self, command: &str, output: &mut W) -> Result<()> {
        writeln!(output, "💡 {}", command)?;
        Ok(())
    }

    /// Asks whether to run `command`. End of input counts as a refusal.
    pub fn confirm_with_io<R: BufRead, W: Write>(
        &self,
        command: &str,
        input: &mut R,
        output: &mut W,
    ) -> Result<Confirmation> {
        write!(output, "Run it? [y/N]: ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        let confirmation = Confirmation::from_answer(&line);
        info!("Operator chose {:?} for '{}'", confirmation, command);
        Ok(confirmation)
    }

    /// Shows how an executed command ended.
    pub fn show_outcome_with_io<W: Write>(&self, outcome: &ExecutionOutcome, output: &mut W) -> Result<()> {
        if outcome.is_success() {
            writeln!(output, "✅ {}", outcome)?;
        } else {
            writeln!(output, "❌ {}", outcome)?;
        }
        Ok(())
    }

    /// Shows that a command was declined.
    pub fn show_skipped_with_io<W: Write>(&self, command: &str, output: &mut W) -> Result<()> {
        writeln!(output, "⏭️  Skipped: {}", command)?;
        Ok(())
    }

    /// Lists history entries, oldest first.
    pub fn show_history_with_io<W: Write>(&self, entries: &[HistoryEntry], output: &mut W) -> Result<()> {
        if entries.is_empty() {
            writeln!(output, "No history yet.")?;
        }
        for entry in entries {
            writeln!(output, "{}", entry.to_line())?;
        }
        Ok(())
    }

    /// Reports a recoverable error and keeps going.
    pub fn show_error_with_io<W: Write>(&self, message: &str, output: &mut W) -> Result<()> {
        writeln!(output, "⚠️  {}", message)?;
        Ok(())
    }
}
