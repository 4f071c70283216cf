//! Configuration loading, validation, and management for LogLens.
//!
//! Loads configuration from `~/.loglens/config.toml` (or an explicit path)
//! with environment variable overrides. Everything the pipeline later assumes
//! to be valid (regex patterns, retention window, token budget) is checked
//! here, once, at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.loglens/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat-completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for every analysis call
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Context budget per call (prompt + completion). 0 = use the model table.
    #[serde(default)]
    pub max_tokens: u32,

    /// Completion allowance reserved for the single-pass analysis
    #[serde(default = "default_reserved_completion")]
    pub reserved_completion: u32,

    /// `max_tokens` sent with each chunk summary request
    #[serde(default = "default_chunk_summary_tokens")]
    pub chunk_summary_tokens: u32,

    /// `max_tokens` sent with the synthesis request
    #[serde(default = "default_synthesis_tokens")]
    pub synthesis_tokens: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub privacy: PrivacyConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Per-container settings, keyed by container name
    #[serde(default)]
    pub containers: BTreeMap<String, ContainerConfig>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_reserved_completion() -> u32 {
    2048
}
fn default_chunk_summary_tokens() -> u32 {
    1024
}
fn default_synthesis_tokens() -> u32 {
    2048
}
fn default_request_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("reserved_completion", &self.reserved_completion)
            .field("chunk_summary_tokens", &self.chunk_summary_tokens)
            .field("synthesis_tokens", &self.synthesis_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry", &self.retry)
            .field("privacy", &self.privacy)
            .field("knowledge", &self.knowledge)
            .field("source", &self.source)
            .field("prompts", &self.prompts)
            .field("containers", &self.containers)
            .finish()
    }
}

/// Transport retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before attempt `i + 1` is `i * base_delay_secs`
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
        }
    }
}

/// What to scrub from log text before it leaves the machine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub anonymize_ips: bool,

    #[serde(default)]
    pub anonymize_secrets: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Storage directory (default: `~/.loglens/knowledge`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Entries older than this many days are pruned, 1..=365
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    30
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// Where the file log source looks for `<container>.log` files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Optional prompt template overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Settings that apply to a single container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Free-form text appended to the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp_filter: Option<RegexpFilterRule>,
}

/// Lines matching any of `patterns` are dropped before analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegexpFilterRule {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Context windows of well-known model families, matched by prefix.
/// More specific prefixes come first.
const CONTEXT_WINDOWS: &[(&str, u32)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o1", 200_000),
    ("o3", 200_000),
    ("o4", 200_000),
    ("claude", 200_000),
];

const FALLBACK_CONTEXT_WINDOW: u32 = 8_192;

/// Log directory read when `[source] dir` is not set.
pub const DEFAULT_SOURCE_DIR: &str = "/var/log/containers";

/// Context window for `model`, falling back to a conservative default.
pub fn context_window_for(model: &str) -> u32 {
    let model = model.rsplit('/').next().unwrap_or(model);
    CONTEXT_WINDOWS
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map_or(FALLBACK_CONTEXT_WINDOW, |(_, window)| *window)
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// Also checks environment variables:
    /// - `LOGLENS_API_KEY` / `OPENAI_API_KEY` (when no key is configured)
    /// - `LOGLENS_MODEL`, `LOGLENS_API_URL`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(path.unwrap_or(&default_path))?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("LOGLENS_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("LOGLENS_MODEL") {
            config.model = model;
        }

        if let Ok(url) = std::env::var("LOGLENS_API_URL") {
            config.api_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loglens")
    }

    /// Where knowledge files live.
    pub fn knowledge_dir(&self) -> PathBuf {
        self.knowledge
            .dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::config_dir().join("knowledge"))
    }

    /// Where the file log source reads from.
    pub fn source_dir(&self) -> PathBuf {
        self.source
            .dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR))
    }

    /// Where prompt overrides are read from.
    pub fn prompts_dir(&self) -> PathBuf {
        self.prompts
            .dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::config_dir().join("prompts"))
    }

    /// Where per-container scan cursors are persisted.
    pub fn state_path() -> PathBuf {
        Self::config_dir().join("state.json")
    }

    /// The context budget actually used for planning.
    pub fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens > 0 {
            self.max_tokens
        } else {
            context_window_for(&self.model)
        }
    }

    /// Settings for `container`, if any were configured.
    pub fn container(&self, name: &str) -> Option<&ContainerConfig> {
        self.containers.get(name)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(1..=365).contains(&self.knowledge.retention_days) {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.retention_days must be between 1 and 365 (got {})",
                self.knowledge.retention_days
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        let budget = self.effective_max_tokens();
        for (key, completion) in [
            ("reserved_completion", self.reserved_completion),
            ("chunk_summary_tokens", self.chunk_summary_tokens),
            ("synthesis_tokens", self.synthesis_tokens),
        ] {
            if completion >= budget {
                return Err(ConfigError::ValidationError(format!(
                    "{key} ({completion}) must be smaller than the context budget ({budget})"
                )));
            }
        }

        for (name, container) in &self.containers {
            let Some(rule) = &container.regexp_filter else {
                continue;
            };
            for pattern in &rule.patterns {
                if let Err(e) = regex_lite::Regex::new(pattern) {
                    return Err(ConfigError::InvalidPattern {
                        container: name.clone(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: 0,
            reserved_completion: default_reserved_completion(),
            chunk_summary_tokens: default_chunk_summary_tokens(),
            synthesis_tokens: default_synthesis_tokens(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
            privacy: PrivacyConfig::default(),
            knowledge: KnowledgeConfig::default(),
            source: SourceConfig::default(),
            prompts: PromptsConfig::default(),
            containers: BTreeMap::new(),
        }
    }
}

/// Replace a leading `~` with the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs_home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid filter pattern {pattern:?} for container {container}: {reason}")]
    InvalidPattern {
        container: String,
        pattern: String,
        reason: String,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
