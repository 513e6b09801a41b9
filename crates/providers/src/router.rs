//! Provider selection: builds the configured reasoning-service client.

use std::sync::Arc;

use tracing::{info, warn};
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider named in configuration.
///
/// `provider.api_url` wins over the preset base URL.
pub fn build_from_config(
    config: &wayfarer_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let settings = &config.provider;
    let name = settings.name.as_str();

    let base_url = match &settings.api_url {
        Some(url) => url.clone(),
        None => default_base_url(name).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}' and no provider.api_url set"
            ))
        })?,
    };

    let api_key = match (&settings.api_key, name) {
        (Some(key), _) => key.clone(),
        (None, "ollama") => "ollama".into(),
        (None, _) => {
            warn!(provider = name, "No API key configured; reasoning calls will be rejected");
            String::new()
        }
    };

    info!(provider = name, model = %settings.model, base_url = %base_url, "Provider configured");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "gemini" | "google" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => return None,
    };
    Some(url.into())
}
