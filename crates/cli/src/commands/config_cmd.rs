//! `wayfarer config`: Configuration management commands.

use wayfarer_config::{AppConfig, ConfigError};

pub fn validate(loaded: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", AppConfig::config_path().display());

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed and validated");

    if !config.has_api_key() {
        println!("   Warning: no API key set (WAYFARER_API_KEY, GOOGLE_API_KEY or OPENAI_API_KEY)");
    }
    if config.provider.api_url.is_none()
        && wayfarer_providers::default_base_url(&config.provider.name).is_none()
    {
        println!(
            "   Warning: provider '{}' has no preset URL and provider.api_url is unset",
            config.provider.name
        );
    }

    println!();
    println!("   Provider:    {}", config.provider.name);
    println!("   Model:       {}", config.provider.model);
    println!("   Retries:     {} attempts", config.retry.max_attempts);
    println!("   Round trips: {}", config.orchestrator.round_trip_limit);
    println!("   Gateway:     {}:{}", config.gateway.host, config.gateway.port);

    Ok(())
}

pub fn show(loaded: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    let config = loaded.map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", render(&config)?);
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_path().display());
}

/// Pretty TOML with the API key masked.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some("[REDACTED]".into());
    }
    toml::to_string_pretty(&shown)
}
