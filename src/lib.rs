//! Hearth - local command suggestions with an append-only memory.
//!
//! Hearth takes a natural-language request, asks a locally-hosted model
//! (through an `ollama`-compatible binary) for a single shell command, shows
//! it, and runs it. Every request, command, result and skip is appended to a
//! plain-text history that is fed back into the next prompt as context.
//!
//! # Architecture
//!
//! - [`history`] - Append-only log (`REQUEST` / `COMMAND` / `RESULT` / `SKIP`)
//! - [`gateway`] - Backend readiness probe, warm-up and invocation
//! - [`prompt`] - Preamble + bounded history tail + request
//! - [`suggestion`] - Model call and candidate extraction
//! - [`executor`] - Runs or skips the candidate and records the outcome
//! - [`driver`] - One-shot and interactive loops
//! - [`confirm_ui`] - Terminal prompts and messages
//! - [`config`] - Configuration file, environment overrides, session state
//! - [`cli`] - Argument parsing
//! - [`providers`] - Shared dependency injection traits
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use hearth::config::{Config, Mode, Session};
//! use hearth::driver::SessionDriver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mode = Mode::Once("show the five largest files here".to_string());
//!     let session = Session::from_config(Config::load()?, mode);
//!
//!     let mut driver = SessionDriver::start(&session).await?;
//!     let exit_code = driver.run(&session.mode).await?;
//!     std::process::exit(exit_code);
//! }
//! ```
//!
//! # Modes
//!
//! ```bash
//! # One-shot: suggest and run immediately, exit with the command's status
//! hearth --once "count lines in every rust file"
//! hearth count lines in every rust file
//!
//! # Interactive: confirm each suggestion with y/yes
//! hearth
//! ```

pub mod cli;
pub mod config;
pub mod confirm_ui;
pub mod driver;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod history;
pub mod prompt;
pub mod providers;
pub mod suggestion;
