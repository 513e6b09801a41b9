//! Tunables for one orchestrator instance.

use std::time::Duration;

use wayfarer_config::AppConfig;
use wayfarer_core::RetryPolicy;

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,

    /// Policy applied to every reasoning call
    pub retry: RetryPolicy,

    /// Maximum completed acting phases before the run fails
    pub round_trip_limit: u32,

    /// Tools running at once within one acting phase (0 means 1)
    pub max_tool_concurrency: usize,

    pub reasoning_timeout: Duration,
    pub tool_timeout: Duration,
    pub request_timeout: Duration,

    /// How long in-flight tools may keep running after cancellation
    pub cancel_grace: Duration,

    /// Progress events queued before content chunks start merging
    pub event_buffer: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: None,
            retry: RetryPolicy::default(),
            round_trip_limit: 10,
            max_tool_concurrency: 8,
            reasoning_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(2),
            event_buffer: 64,
        }
    }
}

impl From<&AppConfig> for LoopSettings {
    fn from(config: &AppConfig) -> Self {
        let orch = &config.orchestrator;
        let prompt = config.assistant.system_prompt.trim();
        Self {
            model: config.provider.model.clone(),
            system_prompt: (!prompt.is_empty()).then(|| prompt.to_string()),
            temperature: config.provider.temperature,
            max_tokens: Some(config.provider.max_tokens),
            retry: config.retry.to_policy(),
            round_trip_limit: orch.round_trip_limit,
            max_tool_concurrency: orch.max_tool_concurrency,
            reasoning_timeout: Duration::from_secs(orch.reasoning_timeout_secs),
            tool_timeout: Duration::from_secs(orch.tool_timeout_secs),
            request_timeout: Duration::from_secs(orch.request_timeout_secs),
            cancel_grace: Duration::from_millis(orch.cancel_grace_ms),
            event_buffer: orch.event_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_default_config() {
        let settings = LoopSettings::from(&AppConfig::default());
        assert_eq!(settings.model, "gemini-2.5-flash");
        assert_eq!(settings.round_trip_limit, 10);
        assert_eq!(settings.max_tool_concurrency, 8);
        assert_eq!(settings.retry, RetryPolicy::default());
        assert_eq!(settings.cancel_grace, Duration::from_secs(2));
        assert!(settings.system_prompt.unwrap().contains("travel assistant"));
    }

    #[test]
    fn blank_prompt_is_omitted() {
        let mut config = AppConfig::default();
        config.assistant.system_prompt = "   ".into();
        assert!(LoopSettings::from(&config).system_prompt.is_none());
    }
}
