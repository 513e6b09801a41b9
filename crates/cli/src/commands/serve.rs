//! `wayfarer serve`: Start the HTTP gateway.

use wayfarer_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Wayfarer Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.provider.name, config.provider.model);
    if !config.has_api_key() {
        println!("   Warning:   no API key configured, reasoning calls will be rejected");
    }

    wayfarer_gateway::start(config).await?;

    Ok(())
}
