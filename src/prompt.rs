//! Prompt construction.

use crate::config::ToolHint;

/// Builds the text sent to the model for one request.
///
/// The output depends only on the inputs: the same request, history and tool
/// list always produce the same prompt.
pub struct PromptBuilder {
    window: usize,
    tools: Vec<ToolHint>,
}

impl PromptBuilder {
    pub fn new(window: usize, tools: Vec<ToolHint>) -> Self {
        Self { window, tools }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Composes preamble, the newest `window` history lines and the request.
    pub fn build(&self, request: &str, history_tail: &[String]) -> String {
        let start = history_tail.len().saturating_sub(self.window);
        let history = &history_tail[start..];

        let mut prompt = String::from(
            "You translate a request into a shell command for a POSIX shell.

OUTPUT CONTRACT:
- Return EXACTLY ONE LINE: a single executable command.
- No markdown, no code fences, no quotes around the command.
- No explanations or commentary before or after the command.
- Chain steps with && or pipes if more than one step is needed.
",
        );

        if !self.tools.is_empty() {
            prompt.push_str("\nHELPER TOOLS available to the operator:\n");
            for tool in &self.tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name, tool.usage));
            }
        }

        prompt.push_str("\nRECENT HISTORY (oldest first):\n");
        if history.is_empty() {
            prompt.push_str("(none)\n");
        } else {
            for line in history {
                prompt.push_str(line);
                prompt.push('\n');
            }
        }

        prompt.push_str(&format!("\nREQUEST: {}\nCOMMAND:", request));
        prompt
    }
}
