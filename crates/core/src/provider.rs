//! Provider trait: the abstraction over reasoning-service backends.
//!
//! A Provider knows how to send a conversation to an LLM and get back
//! either a final answer or a set of requested actions.
//!
//! Implementations: OpenAI-compatible endpoints (Gemini, OpenAI, OpenRouter, Ollama).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{ActionCall, Message};
use crate::tool::ToolDefinition;

/// One reasoning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gemini-2.5-flash")
    pub model: String,

    /// Instructions prepended to the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text (may be empty when actions are requested)
    #[serde(default)]
    pub text: String,

    /// Requested actions, in the order the model listed them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionCall>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    #[serde(default)]
    pub model: String,
}

impl ProviderResponse {
    /// A plain-text answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A response requesting actions.
    pub fn actions(actions: Vec<ActionCall>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The reasoning step calls `complete()` without knowing which backend is
/// being used. One call is one attempt; retries are layered on top.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest = serde_json::from_value(serde_json::json!({
            "model": "gemini-2.5-flash",
            "messages": [{ "kind": "user", "text": "hi" }]
        }))
        .unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.tools.is_empty());
        assert!(req.system_prompt.is_none());
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn response_constructors() {
        let final_answer = ProviderResponse::text("Tokyo is lovely in spring.");
        assert!(final_answer.actions.is_empty());

        let call = ActionCall::new("c1", "get_weather", serde_json::Map::new());
        let request = ProviderResponse::actions(vec![call]);
        assert!(request.text.is_empty());
        assert_eq!(request.actions[0].name, "get_weather");
    }
}
