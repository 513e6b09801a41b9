//! Configuration loading, validation, and management for Wayfarer.
//!
//! Loads configuration from `~/.wayfarer/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use wayfarer_core::RetryPolicy;

/// The root configuration structure.
///
/// Maps directly to `~/.wayfarer/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Retry policy for reasoning calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Loop limits and timeouts
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Assistant persona
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend preset: gemini, openai, openrouter, ollama
    #[serde(default = "default_provider")]
    pub name: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the preset base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum completed acting phases per request
    #[serde(default = "default_round_trip_limit")]
    pub round_trip_limit: u32,

    /// Maximum tools running at once within one acting phase
    #[serde(default = "default_max_tool_concurrency")]
    pub max_tool_concurrency: usize,

    #[serde(default = "default_reasoning_timeout_secs")]
    pub reasoning_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Whole-request deadline
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long in-flight tools may run after cancellation
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Progress events buffered before chunks start coalescing
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_round_trip_limit() -> u32 {
    10
}
fn default_max_tool_concurrency() -> usize {
    8
}
fn default_reasoning_timeout_secs() -> u64 {
    60
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_cancel_grace_ms() -> u64 {
    2000
}
fn default_event_buffer() -> usize {
    64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            round_trip_limit: default_round_trip_limit(),
            max_tool_concurrency: default_max_tool_concurrency(),
            reasoning_timeout_secs: default_reasoning_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            cancel_grace_ms: default_cancel_grace_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_system_prompt() -> String {
    "You are a proactive travel assistant. When users ask about trip planning, you MUST:
1. Immediately call the available tools (search_flights, get_weather, find_attractions) without asking for more details.
2. Use reasonable defaults: use \"2025-12-15\" as the travel date if none is given.
3. After gathering tool results, format your response like this:

Flights Found:
- [Origin] → [Destination], $[Price], [Time]

Weather Forecast:
- Day 1: [Condition]
- Day 2: [Condition]
- Day 3: [Condition]

Top Attractions:
- [Attraction 1]
- [Attraction 2]
- [Attraction 3]

Suggested Itinerary:
Day 1: [Area/Activity]
Day 2: [Area/Activity]
Day 3: [Area/Activity]

Use the tools first, then format the response as shown above."
        .into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.wayfarer/config.toml).
    ///
    /// Environment overrides:
    /// - `WAYFARER_API_KEY`, then `GOOGLE_API_KEY`, then `OPENAI_API_KEY`
    /// - `WAYFARER_PROVIDER`, `WAYFARER_MODEL`, `WAYFARER_PORT`, `WAYFARER_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.provider.api_key.is_none() {
            self.provider.api_key = non_empty("WAYFARER_API_KEY")
                .or_else(|| non_empty("GOOGLE_API_KEY"))
                .or_else(|| non_empty("OPENAI_API_KEY"));
        }
        if let Some(provider) = non_empty("WAYFARER_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(model) = non_empty("WAYFARER_MODEL") {
            self.provider.model = model;
        }
        if let Some(port) = non_empty("WAYFARER_PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("WAYFARER_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(level) = non_empty("WAYFARER_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wayfarer")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.into()));

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return invalid("provider.temperature must be between 0.0 and 2.0");
        }
        if self.provider.model.trim().is_empty() {
            return invalid("provider.model must not be empty");
        }

        let retry = &self.retry;
        if !(1..=10).contains(&retry.max_attempts) {
            return invalid("retry.max_attempts must be between 1 and 10");
        }
        if !(100..=10_000).contains(&retry.initial_delay_ms) {
            return invalid("retry.initial_delay_ms must be between 100 and 10000");
        }
        if !(1.0..=5.0).contains(&retry.backoff_multiplier) {
            return invalid("retry.backoff_multiplier must be between 1.0 and 5.0");
        }
        if !(1_000..=300_000).contains(&retry.max_delay_ms) {
            return invalid("retry.max_delay_ms must be between 1000 and 300000");
        }

        let orch = &self.orchestrator;
        if orch.round_trip_limit == 0 {
            return invalid("orchestrator.round_trip_limit must be at least 1");
        }
        if orch.reasoning_timeout_secs == 0
            || orch.tool_timeout_secs == 0
            || orch.request_timeout_secs == 0
        {
            return invalid("orchestrator timeouts must be greater than zero");
        }
        if orch.event_buffer == 0 {
            return invalid("orchestrator.event_buffer must be at least 1");
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.name, "gemini");
        assert_eq!(config.provider.model, "gemini-2.5-flash");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.orchestrator.round_trip_limit, 10);
        assert_eq!(config.orchestrator.max_tool_concurrency, 8);
    }

    #[test]
    fn retry_defaults_map_to_policy() {
        let policy = AppConfig::default().retry.to_policy();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.name, config.provider.name);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.assistant.system_prompt, config.assistant.system_prompt);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[retry]\nmax_attempts = 5\n\n[orchestrator]\nround_trip_limit = 4\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.orchestrator.round_trip_limit, 4);
        assert_eq!(config.orchestrator.tool_timeout_secs, 30);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry\nmax_attempts = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn out_of_range_retry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nbackoff_multiplier = 9.0\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("backoff_multiplier"));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.name, "gemini");
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_API_KEY", "google-key"),
            ("OPENAI_API_KEY", "openai-key"),
            ("WAYFARER_MODEL", "gemini-2.5-pro"),
            ("WAYFARER_PORT", "9090"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.provider.api_key.as_deref(), Some("google-key"));
        assert_eq!(config.provider.model, "gemini-2.5-pro");
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.provider.name, "gemini");
    }

    #[test]
    fn bad_port_override_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "WAYFARER_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret-value".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.5-flash"));
        assert!(toml_str.contains("8000"));
    }
}
