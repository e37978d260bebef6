//! Suggestion engine: turns a request into one candidate command.

use crate::error::HearthError;
use crate::gateway::ModelGateway;
use crate::history::HistoryStore;
use crate::prompt::PromptBuilder;
use tracing::{info, warn};

/// Picks the candidate command out of a free-form model response.
///
/// Returns the last line that is not blank, with surrounding whitespace
/// trimmed. Models often prepend reasoning; if they append commentary
/// instead, this picks the commentary.
pub fn extract_command(response: &str) -> Option<&str> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
}

/// Orchestrates prompt building and the model call.
pub struct SuggestionEngine {
    builder: PromptBuilder,
    gateway: ModelGateway,
}

impl SuggestionEngine {
    pub fn new(builder: PromptBuilder, gateway: ModelGateway) -> Self {
        Self { builder, gateway }
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Produces a candidate command for `request`.
    ///
    /// Reads the history tail fresh from disk on every call.
    pub async fn suggest(&mut self, history: &HistoryStore, request: &str) -> Result<String, HearthError> {
        let tail = history.tail(self.builder.window())?;
        let prompt = self.builder.build(request, &tail);

        let response = self.gateway.invoke(&prompt).await.map_err(|e| {
            warn!("Model call failed: {}", e);
            HearthError::SuggestionUnavailable(e.to_string())
        })?;

        match extract_command(&response) {
            Some(command) => {
                info!("Model suggested: {}", command);
                Ok(command.to_string())
            }
            None => Err(HearthError::SuggestionUnavailable(
                "model response contained no command".to_string(),
            )),
        }
    }
}
