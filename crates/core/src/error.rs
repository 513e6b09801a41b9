//! Error types for the Wayfarer domain.
//!
//! Each bounded context has its own `thiserror` enum.

use thiserror::Error;

use crate::retry::{Classify, ErrorClass};

/// Failures of a single call to the reasoning service.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl Classify for ProviderError {
    /// Network trouble, timeouts, rate limits, 408 and 5xx are worth another
    /// attempt. Everything else means the request itself is wrong.
    fn class(&self) -> ErrorClass {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => ErrorClass::Transient,
            Self::ApiError { status_code, .. } if *status_code == 408 || *status_code >= 500 => {
                ErrorClass::Transient
            }
            Self::ApiError { .. }
            | Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_)
            | Self::NotConfigured(_)
            | Self::MalformedResponse(_) => ErrorClass::Permanent,
        }
    }
}

/// Failures localized to a single action. These never abort a request; they
/// are turned into error payloads and handed back to the reasoning step.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool panicked: {tool_name}")]
    Panicked { tool_name: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid tool registration: {0}")]
    InvalidRegistration(String),
}

impl ToolError {
    /// Machine-readable kind used in error payloads fed back to the reasoning step.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "unknown_action",
            Self::ExecutionFailed { .. } => "tool_error",
            Self::Timeout { .. } => "tool_timeout",
            Self::Panicked { .. } => "tool_panicked",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::InvalidRegistration(_) => "invalid_registration",
        }
    }

    /// Render this error as a structured action payload.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}
