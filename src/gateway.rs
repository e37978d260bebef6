//! Model gateway: lifecycle of the locally-hosted model backend.
//!
//! The backend is an `ollama`-compatible binary. `<bin> ps` lists the models
//! currently loaded in memory, and `<bin> run <model>` reads a prompt on stdin
//! and prints the model's answer. Everything process-specific lives in
//! [`OllamaBackend`]; the [`ModelGateway`] only sees the [`ModelBackend`] trait,
//! so tests can drive it with a deterministic stand-in.

use crate::error::HearthError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Fixed priming prompt sent during warm-up. The answer is discarded.
pub const WARMUP_PROMPT: &str = "Reply with the single word: ready";

/// Narrow capability interface over the model backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Lists the identifiers of the models currently loaded.
    async fn loaded_models(&self) -> Result<Vec<String>, HearthError>;

    /// Sends one prompt to `model` and returns the full textual response.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, HearthError>;
}

/// Backend driven through the `ollama` command-line binary.
pub struct OllamaBackend {
    binary: String,
}

impl OllamaBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn locate(&self) -> Result<PathBuf, HearthError> {
        which::which(&self.binary).map_err(|e| {
            HearthError::BackendUnavailable(format!("cannot locate '{}': {}", self.binary, e))
        })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn loaded_models(&self) -> Result<Vec<String>, HearthError> {
        let binary = self.locate()?;
        let output = Command::new(binary)
            .arg("ps")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HearthError::BackendUnavailable(format!("{} ps: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(HearthError::Backend(format!(
                "{} ps exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_loaded_models(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, HearthError> {
        let binary = self.locate()?;
        let mut child = Command::new(binary)
            .arg("run")
            .arg(model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HearthError::BackendUnavailable(format!("{} run: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| HearthError::Backend(format!("writing prompt: {}", e)))?;
            // Dropping stdin closes the pipe so the backend sees end of input.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HearthError::Backend(format!("waiting for {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(HearthError::Backend(format!(
                "{} run exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(HearthError::Backend("backend returned an empty response".to_string()));
        }
        Ok(text)
    }
}

/// Parses the table printed by `ollama ps`, returning the NAME column.
///
/// ```text
/// NAME                ID              SIZE      PROCESSOR    UNTIL
/// qwen2.5-coder:7b    2b0496514337    6.0 GB    100% GPU     4 minutes from now
/// ```
pub fn parse_loaded_models(table: &str) -> Vec<String> {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "NAME")
        .map(|name| name.to_string())
        .collect()
}

/// Whether a listed model name refers to the configured identifier.
///
/// An untagged identifier matches its `:latest` tag.
pub fn model_matches(configured: &str, listed: &str) -> bool {
    if configured == listed {
        return true;
    }
    !configured.contains(':') && listed.strip_suffix(":latest") == Some(configured)
}

/// Lifecycle states of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Unknown,
    Probing,
    Warm,
    ColdWarming,
    Failed,
}

/// Owns the backend and tracks whether the model is loaded.
pub struct ModelGateway {
    backend: Box<dyn ModelBackend>,
    model: String,
    state: GatewayState,
    probe_timeout: Duration,
    warmup_timeout: Duration,
}

impl ModelGateway {
    pub fn new(
        backend: Box<dyn ModelBackend>,
        model: impl Into<String>,
        probe_timeout: Duration,
        warmup_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            state: GatewayState::Unknown,
            probe_timeout,
            warmup_timeout,
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Probes the backend for the configured model.
    ///
    /// Never waits longer than the probe timeout. Any failure leaves the
    /// gateway in [`GatewayState::Failed`].
    pub async fn is_ready(&mut self) -> bool {
        self.state = GatewayState::Probing;

        let probe = tokio::time::timeout(self.probe_timeout, self.backend.loaded_models()).await;
        self.state = match probe {
            Ok(Ok(models)) if models.iter().any(|m| model_matches(&self.model, m)) => {
                info!("Model '{}' is already loaded", self.model);
                GatewayState::Warm
            }
            Ok(Ok(models)) => {
                debug!("Model '{}' not among loaded models {:?}", self.model, models);
                GatewayState::Failed
            }
            Ok(Err(e)) => {
                warn!("Readiness probe failed: {}", e);
                GatewayState::Failed
            }
            Err(_) => {
                warn!("Readiness probe timed out after {:?}", self.probe_timeout);
                GatewayState::Failed
            }
        };

        self.state == GatewayState::Warm
    }

    /// Sends the priming prompt when the model is not warm yet.
    ///
    /// Only a missing backend is reported as an error; every other failure is
    /// logged and the gateway continues in [`GatewayState::ColdWarming`].
    pub async fn warm_up(&mut self) -> Result<(), HearthError> {
        if self.state == GatewayState::Warm {
            return Ok(());
        }

        info!("Warming up model '{}'", self.model);
        let call = self.backend.complete(&self.model, WARMUP_PROMPT);
        match tokio::time::timeout(self.warmup_timeout, call).await {
            Ok(Ok(_)) => {
                self.state = GatewayState::Warm;
                Ok(())
            }
            Ok(Err(e @ HearthError::BackendUnavailable(_))) => {
                self.state = GatewayState::Failed;
                Err(e)
            }
            Ok(Err(e)) => {
                warn!("Warm-up failed, first request may be slow: {}", e);
                self.state = GatewayState::ColdWarming;
                Ok(())
            }
            Err(_) => {
                warn!(
                    "Warm-up timed out after {:?}, first request may be slow",
                    self.warmup_timeout
                );
                self.state = GatewayState::ColdWarming;
                Ok(())
            }
        }
    }

    /// Probes and, if needed, warms the backend. Called once at startup.
    pub async fn prepare(&mut self) -> Result<GatewayState, HearthError> {
        if !self.is_ready().await {
            self.warm_up().await?;
        }
        Ok(self.state)
    }

    /// Sends `prompt` to the model and returns the raw response.
    pub async fn invoke(&mut self, prompt: &str) -> Result<String, HearthError> {
        debug!("Invoking model '{}' with {} byte prompt", self.model, prompt.len());
        let response = self.backend.complete(&self.model, prompt).await?;
        self.state = GatewayState::Warm;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Stand-in backend with scripted answers.
    struct ScriptedBackend {
        loaded: Result<Vec<String>, String>,
        complete: Mutex<Vec<Result<String, HearthError>>>,
        probe_delay: Option<Duration>,
        complete_delay: Option<Duration>,
    }

    impl ScriptedBackend {
        fn new(loaded: &[&str]) -> Self {
            Self {
                loaded: Ok(loaded.iter().map(|s| s.to_string()).collect()),
                complete: Mutex::new(Vec::new()),
                probe_delay: None,
                complete_delay: None,
            }
        }

        fn answering(mut self, answers: Vec<Result<String, HearthError>>) -> Self {
            self.complete = Mutex::new(answers.into_iter().rev().collect());
            self
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn loaded_models(&self) -> Result<Vec<String>, HearthError> {
            if let Some(delay) = self.probe_delay {
                tokio::time::sleep(delay).await;
            }
            self.loaded.clone().map_err(HearthError::Backend)
        }

        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, HearthError> {
            if let Some(delay) = self.complete_delay {
                tokio::time::sleep(delay).await;
            }
            self.complete
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(HearthError::Backend("no scripted answer".into())))
        }
    }

    fn gateway(backend: ScriptedBackend) -> ModelGateway {
        ModelGateway::new(
            Box::new(backend),
            "llama3.2",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_parse_loaded_models_skips_header() {
        let table = "NAME                ID              SIZE      PROCESSOR    UNTIL\n\
                     qwen2.5-coder:7b    2b0496514337    6.0 GB    100% GPU     4 minutes from now\n\
                     llama3.2:latest     a80c4f17acd5    3.5 GB    100% GPU     2 minutes from now\n";
        assert_eq!(
            parse_loaded_models(table),
            vec!["qwen2.5-coder:7b".to_string(), "llama3.2:latest".to_string()]
        );
    }

    #[test]
    fn test_parse_loaded_models_empty_table() {
        assert!(parse_loaded_models("NAME    ID    SIZE    PROCESSOR    UNTIL\n").is_empty());
        assert!(parse_loaded_models("").is_empty());
    }

    #[test]
    fn test_model_matches() {
        assert!(model_matches("llama3.2", "llama3.2"));
        assert!(model_matches("llama3.2", "llama3.2:latest"));
        assert!(!model_matches("llama3.2:1b", "llama3.2:latest"));
        assert!(!model_matches("llama3", "llama3.2:latest"));
    }

    #[tokio::test]
    async fn test_ready_when_model_loaded() {
        let mut gw = gateway(ScriptedBackend::new(&["llama3.2:latest"]));
        assert_eq!(gw.state(), GatewayState::Unknown);

        assert!(gw.is_ready().await);
        assert_eq!(gw.state(), GatewayState::Warm);
    }

    #[tokio::test]
    async fn test_not_ready_when_model_missing() {
        let mut gw = gateway(ScriptedBackend::new(&["mistral:latest"]));
        assert!(!gw.is_ready().await);
        assert_eq!(gw.state(), GatewayState::Failed);
    }

    #[tokio::test]
    async fn test_probe_error_is_failed() {
        let mut backend = ScriptedBackend::new(&[]);
        backend.loaded = Err("connection refused".to_string());
        let mut gw = gateway(backend);

        assert!(!gw.is_ready().await);
        assert_eq!(gw.state(), GatewayState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_times_out() {
        let mut backend = ScriptedBackend::new(&["llama3.2"]);
        backend.probe_delay = Some(Duration::from_secs(60));
        let mut gw = gateway(backend);

        assert!(!gw.is_ready().await);
        assert_eq!(gw.state(), GatewayState::Failed);
    }

    #[tokio::test]
    async fn test_warm_up_success_becomes_warm() {
        let backend = ScriptedBackend::new(&[]).answering(vec![Ok("ready".to_string())]);
        let mut gw = gateway(backend);

        assert_eq!(gw.prepare().await.unwrap(), GatewayState::Warm);
    }

    #[tokio::test]
    async fn test_warm_up_failure_is_not_fatal() {
        let backend = ScriptedBackend::new(&[])
            .answering(vec![Err(HearthError::Backend("model loading".into()))]);
        let mut gw = gateway(backend);

        assert_eq!(gw.prepare().await.unwrap(), GatewayState::ColdWarming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_up_timeout_is_not_fatal() {
        let mut backend = ScriptedBackend::new(&[]).answering(vec![Ok("ready".to_string())]);
        backend.complete_delay = Some(Duration::from_secs(600));
        let mut gw = ModelGateway::new(
            Box::new(backend),
            "llama3.2",
            Duration::from_secs(1),
            Duration::from_secs(5),
        );

        assert_eq!(gw.prepare().await.unwrap(), GatewayState::ColdWarming);
    }

    #[tokio::test]
    async fn test_warm_up_missing_backend_is_fatal() {
        let backend = ScriptedBackend::new(&[])
            .answering(vec![Err(HearthError::BackendUnavailable("no ollama".into()))]);
        let mut gw = gateway(backend);

        let err = gw.prepare().await.unwrap_err();
        assert!(matches!(err, HearthError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_warm_up_skipped_when_warm() {
        // No scripted answers: a warm-up call would fail.
        let mut gw = gateway(ScriptedBackend::new(&["llama3.2"]));
        assert_eq!(gw.prepare().await.unwrap(), GatewayState::Warm);
    }

    #[tokio::test]
    async fn test_invoke_after_cold_start_becomes_warm() {
        let backend = ScriptedBackend::new(&[]).answering(vec![
            Err(HearthError::Backend("still loading".into())),
            Ok("ls -la\n".to_string()),
        ]);
        let mut gw = gateway(backend);
        gw.prepare().await.unwrap();
        assert_eq!(gw.state(), GatewayState::ColdWarming);

        let response = gw.invoke("list files").await.unwrap();

        assert_eq!(response, "ls -la\n");
        assert_eq!(gw.state(), GatewayState::Warm);
    }

    #[tokio::test]
    async fn test_ollama_backend_missing_binary() {
        let backend = OllamaBackend::new("hearth-definitely-not-installed");
        let err = backend.complete("llama3.2", "hi").await.unwrap_err();
        assert!(matches!(err, HearthError::BackendUnavailable(_)));
    }
}
