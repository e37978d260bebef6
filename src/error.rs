//! Error taxonomy for the suggestion pipeline.
//!
//! Execution failures are deliberately absent: a command that exits non-zero
//! is an ordinary [`crate::executor::ExecutionOutcome`], not an error.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the pipeline components.
#[derive(Debug, Error)]
pub enum HearthError {
    /// Bad or missing command-line input.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend binary could not be located or started.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend ran but reported a hard failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The model call failed, so no candidate command exists.
    #[error("no suggestion available: {0}")]
    SuggestionUnavailable(String),

    /// The history log could not be created, read or appended to.
    #[error("history storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HearthError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
