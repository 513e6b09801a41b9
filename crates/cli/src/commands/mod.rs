pub mod ask;
pub mod config_cmd;
pub mod serve;
pub mod tools;

use std::sync::Arc;

use wayfarer_agent::{LoopSettings, Orchestrator};
use wayfarer_config::AppConfig;

/// Wire provider, tools and settings into an orchestrator.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let provider = wayfarer_providers::build_from_config(config)?;
    let tools = Arc::new(wayfarer_tools::default_registry()?);
    Ok(Orchestrator::new(provider, tools, LoopSettings::from(config)))
}
