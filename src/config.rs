use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable selecting the backend model identifier.
pub const MODEL_ENV: &str = "HEARTH_MODEL";
/// Environment variable overriding the backend binary.
pub const BACKEND_ENV: &str = "HEARTH_BACKEND";

pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";
pub const DEFAULT_BACKEND: &str = "ollama";
pub const DEFAULT_HISTORY_PATH: &str = "journal/command_history.log";
pub const DEFAULT_HISTORY_WINDOW: usize = 400;

/// A helper tool advertised to the model in the prompt preamble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolHint {
    pub name: String,
    pub usage: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_warmup_timeout_secs")]
    pub warmup_timeout_secs: u64,
    #[serde(default = "default_tools")]
    pub tools: Vec<ToolHint>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_history_path() -> PathBuf {
    PathBuf::from(DEFAULT_HISTORY_PATH)
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_warmup_timeout_secs() -> u64 {
    120
}

fn default_tools() -> Vec<ToolHint> {
    vec![ToolHint {
        name: "rhizome_mem.py".to_string(),
        usage: "python3 rhizome_mem.py \"<title>\" -c \"<content>\" -l <link> \
                (create or update an associative note under .rhizome/notes)"
            .to_string(),
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            backend: default_backend(),
            history_path: default_history_path(),
            history_window: default_history_window(),
            probe_timeout_secs: default_probe_timeout_secs(),
            warmup_timeout_secs: default_warmup_timeout_secs(),
            tools: default_tools(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables, or use defaults
    pub fn load() -> Result<Self> {
        Ok(Self::load_with_status()?.0)
    }

    /// Like [`Config::load`], also reporting what happened to the config file.
    pub fn load_with_status() -> Result<(Self, ConfigStatus)> {
        let (mut config, status) = Self::load_from_path(&Self::get_config_path()?);

        // Environment variables override config file
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok((config, status))
    }

    /// Applies environment overrides using the given lookup (for testing).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        if let Some(backend) = lookup(BACKEND_ENV).filter(|b| !b.trim().is_empty()) {
            self.backend = backend.trim().to_string();
        }
    }

    /// Reads `path`, falling back to defaults when it is missing or invalid.
    ///
    /// A missing file is normal. A file that exists but cannot be used is
    /// reported at `warn` so the operator sees it with the default filter.
    fn load_from_path(path: &Path) -> (Self, ConfigStatus) {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return (Self::default(), ConfigStatus::NotFound);
        }

        let loaded = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| Self::from_toml(&content));
        match loaded {
            Ok(config) => {
                info!("Loaded config from: {}", path.display());
                (config, ConfigStatus::Found)
            }
            Err(e) => {
                warn!("Ignoring invalid config file {}: {:#}", path.display(), e);
                (Self::default(), ConfigStatus::Invalid(format!("{:#}", e)))
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.history_window == 0 {
            return Err(anyhow!("history_window must be at least 1"));
        }
        Ok(config)
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".hearth"))
    }

    pub fn show_config_info(&self, status: &ConfigStatus) -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());
        println!("Status: {}", status);
        println!();
        println!("Model: {}", self.model);
        println!("Backend: {}", self.backend);
        println!("History log: {}", self.history_path.display());
        println!("History window: {} lines", self.history_window);
        println!("Probe timeout: {}s", self.probe_timeout_secs);
        println!("Warm-up timeout: {}s", self.warmup_timeout_secs);
        for tool in &self.tools {
            println!("Tool hint: {}", tool.name);
        }

        println!("\nTo choose a model:");
        println!("  export {}=<model>", MODEL_ENV);

        Ok(())
    }
}

/// Outcome of looking for the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Found,
    NotFound,
    /// The file exists but could not be read or parsed.
    Invalid(String),
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigStatus::Found => write!(f, "Found"),
            ConfigStatus::NotFound => write!(f, "Not found (using defaults)"),
            ConfigStatus::Invalid(reason) => write!(f, "Invalid, using defaults ({})", reason),
        }
    }
}

/// How the session handles requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Handle one request, run it without confirmation, exit.
    Once(String),
    /// Read requests until the operator says `exit` or `quit`.
    Interactive,
}

/// Startup state, resolved once and handed to every component.
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: Mode,
    pub model: String,
    pub backend: String,
    pub history_path: PathBuf,
    pub history_window: usize,
    pub probe_timeout: Duration,
    pub warmup_timeout: Duration,
    pub tools: Vec<ToolHint>,
}

impl Session {
    pub fn from_config(config: Config, mode: Mode) -> Self {
        Self {
            mode,
            model: config.model,
            backend: config.backend,
            history_path: config.history_path,
            history_window: config.history_window,
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            warmup_timeout: Duration::from_secs(config.warmup_timeout_secs),
            tools: config.tools,
        }
    }
}
