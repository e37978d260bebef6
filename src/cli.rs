//! Command-line parsing.

use crate::config::Mode;
use crate::error::HearthError;
use clap::error::ErrorKind;
use clap::{value_parser, Arg, ArgAction, Command};
use std::ffi::OsString;

/// Number of entries `--history` prints when no count is given.
pub const DEFAULT_HISTORY_COUNT: usize = 20;

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Print the rendered usage text and exit.
    Help(String),
    ShowConfig,
    ShowHistory(usize),
    Run(Mode),
}

pub fn build_command() -> Command {
    Command::new("hearth")
        .about("Local command suggestions - describe it, see the command, run it")
        .long_about(
            "hearth asks a locally-hosted model to turn a request into one shell command. \
             With a request it runs the command straight away; without one it starts an \
             interactive loop that asks before running anything. Every request and outcome \
             is appended to journal/command_history.log and fed back as context.",
        )
        .arg(
            Arg::new("once")
                .long("once")
                .value_name("REQUEST")
                .help("Handle one request, run the command without asking, and exit")
                .num_args(1),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Show configuration information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .value_name("N")
                .help("Show the last N history entries")
                .num_args(0..=1)
                .default_missing_value("20")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("request")
                .help("Request words; same as --once with the words joined")
                .num_args(1..),
        )
}

/// Parses the process arguments (including the program name).
///
/// Help requests are returned as [`Invocation::Help`]; every other clap error
/// becomes [`HearthError::Configuration`] carrying clap's rendered message.
pub fn parse_args<I, T>(args: I) -> Result<Invocation, HearthError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match build_command().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            return Ok(Invocation::Help(e.render().to_string()));
        }
        Err(e) => return Err(HearthError::Configuration(e.render().to_string())),
    };

    if matches.get_flag("config") {
        return Ok(Invocation::ShowConfig);
    }
    if let Some(count) = matches.get_one::<usize>("history") {
        return Ok(Invocation::ShowHistory(*count));
    }

    let once = matches.get_one::<String>("once").cloned();
    let words: Vec<String> = matches
        .get_many::<String>("request")
        .unwrap_or_default()
        .cloned()
        .collect();

    if once.is_none() && words.is_empty() {
        return Ok(Invocation::Run(Mode::Interactive));
    }

    let request = once.into_iter().chain(words).collect::<Vec<_>>().join(" ");
    if request.trim().is_empty() {
        return Err(HearthError::Configuration("the request is empty".to_string()));
    }
    Ok(Invocation::Run(Mode::Once(request)))
}
