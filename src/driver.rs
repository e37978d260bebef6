use crate::{
    config::{Mode, Session},
    confirm_ui::{is_exit_directive, Confirmation, ConfirmationUI},
    error::HearthError,
    executor::Executor,
    gateway::{ModelGateway, OllamaBackend},
    history::{collapse_whitespace, EntryKind, HistoryStore},
    prompt::PromptBuilder,
    suggestion::SuggestionEngine,
};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

/// Top-level loop tying the pipeline together.
///
/// Every request is logged as `REQUEST` before the model is asked, so a failed
/// suggestion still leaves a trace of what was asked.
pub struct SessionDriver {
    history: HistoryStore,
    engine: SuggestionEngine,
    executor: Executor,
    ui: ConfirmationUI,
}

impl SessionDriver {
    pub fn new(history: HistoryStore, engine: SuggestionEngine, executor: Executor, ui: ConfirmationUI) -> Self {
        Self {
            history,
            engine,
            executor,
            ui,
        }
    }

    /// Builds the production pipeline for `session`.
    ///
    /// Creates the history log and readies the backend. Fails only on
    /// conditions the session cannot run without: an unwritable log or a
    /// backend binary that does not exist.
    pub async fn start(session: &Session) -> Result<Self, HearthError> {
        let history = HistoryStore::new(&session.history_path);
        history.ensure()?;

        let mut gateway = ModelGateway::new(
            Box::new(OllamaBackend::new(&session.backend)),
            &session.model,
            session.probe_timeout,
            session.warmup_timeout,
        );
        let state = gateway.prepare().await?;
        info!("Backend '{}' ready in state {:?}", session.model, state);

        let builder = PromptBuilder::new(session.history_window, session.tools.clone());
        Ok(Self::new(
            history,
            SuggestionEngine::new(builder, gateway),
            Executor::new(),
            ConfirmationUI::new(),
        ))
    }

    /// Runs the session on the process's stdin/stdout and returns the exit code.
    pub async fn run(&mut self, mode: &Mode) -> Result<i32> {
        let mut output = io::stdout();
        match mode {
            Mode::Once(request) => self.run_once_with_io(request, &mut output).await,
            Mode::Interactive => {
                let stdin = io::stdin();
                let mut input = stdin.lock();
                self.run_interactive_with_io(&mut input, &mut output).await
            }
        }
    }

    /// Handles a single request without confirmation.
    ///
    /// The returned exit code mirrors the executed command's. A failed
    /// suggestion is returned as an error.
    pub async fn run_once_with_io<W: Write>(&mut self, request: &str, output: &mut W) -> Result<i32> {
        let request = collapse_whitespace(request);
        self.history.append(EntryKind::Request, &request)?;

        let command = self.engine.suggest(&self.history, &request).await?;
        self.ui.show_suggestion_with_io(&command, output)?;
        output.flush()?;

        let outcome = self.executor.execute(&self.history, &command).await?;
        self.ui.show_outcome_with_io(&outcome, output)?;
        Ok(outcome.exit_code)
    }

    /// Reads requests until `exit`, `quit` or end of input.
    ///
    /// Suggestion failures are reported and the loop continues. Storage
    /// failures end the session.
    pub async fn run_interactive_with_io<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<i32> {
        self.ui.show_banner_with_io(self.engine.gateway().model(), output)?;

        loop {
            let Some(line) = self.ui.read_request_with_io(input, output)? else {
                writeln!(output)?;
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit_directive(line) {
                break;
            }

            let request = collapse_whitespace(line);
            self.history.append(EntryKind::Request, &request)?;

            let command = match self.engine.suggest(&self.history, &request).await {
                Ok(command) => command,
                Err(e @ HearthError::Storage { .. }) => return Err(e.into()),
                Err(e) => {
                    warn!("Request '{}' left unanswered: {}", request, e);
                    self.ui.show_error_with_io(&e.to_string(), output)?;
                    continue;
                }
            };

            self.ui.show_suggestion_with_io(&command, output)?;
            match self.ui.confirm_with_io(&command, input, output)? {
                Confirmation::Run => {
                    output.flush()?;
                    let outcome = self.executor.execute(&self.history, &command).await?;
                    self.ui.show_outcome_with_io(&outcome, output)?;
                }
                Confirmation::Skip => {
                    self.executor.skip(&self.history, &command)?;
                    self.ui.show_skipped_with_io(&command, output)?;
                }
            }
        }

        info!("Interactive session ended");
        Ok(0)
    }
}
