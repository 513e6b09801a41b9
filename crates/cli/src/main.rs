//! Wayfarer CLI: the main entry point.
//!
//! Commands:
//! - `serve`  : Start the HTTP gateway
//! - `ask`    : Run a single travel request
//! - `tools`  : List the registered tools
//! - `config` : Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wayfarer_config::{AppConfig, ConfigError, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer, a travel assistant orchestrator",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the travel assistant a single question
    Ask {
        /// The request, e.g. "Plan a trip from Austin to Tokyo"
        query: String,

        /// Print progress events as they arrive
        #[arg(short, long)]
        stream: bool,
    },

    /// List the tools available to the assistant
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = AppConfig::load();
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(cli.verbose, &logging);

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(loaded)?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate(loaded)?,
        },
        Commands::Serve { port } => commands::serve::run(require(loaded)?, port).await?,
        Commands::Ask { query, stream } => commands::ask::run(&require(loaded)?, query, stream).await?,
        Commands::Tools => commands::tools::run()?,
    }

    Ok(())
}

fn require(loaded: Result<AppConfig, ConfigError>) -> Result<AppConfig, String> {
    loaded.map_err(|e| format!("Failed to load config: {e}"))
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
