//! OpenAI-compatible provider implementation.
//!
//! Works with: Gemini (OpenAI compatibility endpoint), OpenAI, OpenRouter,
//! Ollama, and any OpenAI-compatible `/chat/completions` endpoint.
//!
//! Supports chat completions with tool use / function calling.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wayfarer_core::error::ProviderError;
use wayfarer_core::message::{ActionCall, Message};
use wayfarer_core::provider::{ProviderRequest, ProviderResponse, Usage};
use wayfarer_core::tool::ToolDefinition;

/// Seconds to report when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Error bodies are truncated to this many bytes before logging.
const MAX_ERROR_BODY: usize = 512;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create a Gemini provider (convenience constructor).
    pub fn gemini(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key,
        )
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert the conversation to OpenAI API messages.
    fn to_api_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);

        if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
            out.push(ApiMessage::text("system", prompt));
        }

        for message in messages {
            let api = match message {
                Message::User { text } => ApiMessage::text("user", text),
                Message::AssistantFinal { text } => ApiMessage::text("assistant", text),
                Message::AssistantRequest { text, actions } => ApiMessage {
                    role: "assistant".into(),
                    content: (!text.is_empty()).then(|| text.clone()),
                    tool_calls: Some(actions.iter().map(ApiToolCall::from_action).collect()),
                    tool_call_id: None,
                    name: None,
                },
                Message::ActionResult {
                    action_id,
                    action_name,
                    payload,
                    ..
                } => ApiMessage {
                    role: "tool".into(),
                    content: Some(payload.to_string()),
                    tool_calls: None,
                    tool_call_id: Some(action_id.clone()),
                    name: Some(action_name.clone()),
                },
            };
            out.push(api);
        }

        out
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system_prompt.as_deref(), &request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Map a non-success HTTP status to a provider error.
    fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            401 | 403 => ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            404 => ProviderError::ModelNotFound(truncate(body)),
            _ => ProviderError::ApiError {
                status_code: status,
                message: truncate(body),
            },
        }
    }

    fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let actions = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ApiToolCall::into_action)
            .collect();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            actions,
            usage,
            model: api_response.model,
        })
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("... [truncated]");
    }
    body
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

#[async_trait]
impl wayfarer_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after(&response);
            let error_body = response.text().await.unwrap_or_default();
            let err = Self::status_error(status, retry_after, error_body);
            warn!(provider = %self.name, status, error = %err, "Provider returned error");
            return Err(err);
        }

        // A body cut off mid-read is a transport failure, not a bad payload.
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        let api_response: ApiResponse = serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        Self::parse_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

impl ApiToolCall {
    fn from_action(action: &ActionCall) -> Self {
        Self {
            id: action.id.clone(),
            r#type: function_type(),
            function: ApiFunction {
                name: action.name.clone(),
                arguments: serde_json::Value::Object(action.arguments.clone()).to_string(),
            },
        }
    }

    /// Arguments arrive as a JSON string; anything that is not an object
    /// becomes an empty map and the tool reports the missing fields.
    fn into_action(self) -> ActionCall {
        let arguments = match serde_json::from_str::<serde_json::Value>(&self.function.arguments) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                if !self.function.arguments.trim().is_empty() {
                    warn!(
                        tool = %self.function.name,
                        arguments = %self.function.arguments,
                        "Tool call arguments are not a JSON object"
                    );
                }
                serde_json::Map::new()
            }
        };
        ActionCall::new(self.id, self.function.name, arguments)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
