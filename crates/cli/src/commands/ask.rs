//! `wayfarer ask`: Run one travel request from the terminal.

use futures::StreamExt;
use tracing::debug;
use tokio_util::sync::CancellationToken;
use wayfarer_agent::{ProgressEvent, StepKind};
use wayfarer_config::AppConfig;

use super::build_orchestrator;

pub async fn run(config: &AppConfig, query: String, stream: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_api_key() && config.provider.name != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    WAYFARER_API_KEY   (generic)");
        eprintln!("    GOOGLE_API_KEY     (for Gemini)");
        eprintln!("    OPENAI_API_KEY     (for OpenAI)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let orchestrator = build_orchestrator(config)?;
    debug!(
        provider = %config.provider.name,
        model = %config.provider.model,
        stream,
        "Running single request"
    );

    // Ctrl-C cancels the run instead of killing the process mid-request
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling...");
            on_interrupt.cancel();
        }
    });

    if !stream {
        eprint!("  Thinking...");
        let outcome = orchestrator.run(query, &cancel).await;
        eprint!("\r              \r");

        let report = outcome?;
        println!("{}", report.text);
        if !report.used_tools.is_empty() {
            eprintln!();
            eprintln!("  Tools used: {}", report.used_tools.join(", "));
        }
        return Ok(());
    }

    let mut events = orchestrator.run_stream(query, &cancel);
    let mut failure = None;
    while let Some(event) = events.next().await {
        if let ProgressEvent::Failed { reason } = &event {
            failure = Some(reason.clone());
        }
        if let Some(line) = render_event(&event) {
            println!("{line}");
        }
    }

    match failure {
        Some(reason) => Err(format!("Request failed: {reason}").into()),
        None => Ok(()),
    }
}

/// One terminal line per progress event. Chunks are not repeated once the
/// final answer has been printed.
fn render_event(event: &ProgressEvent) -> Option<String> {
    let line = match event {
        ProgressEvent::StepStarted { step, round_trip } => match step {
            StepKind::Reasoning => format!("  [round {round_trip}] thinking..."),
            StepKind::Acting => format!("  [round {round_trip}] running tools..."),
        },
        ProgressEvent::ActionRequested { name, arguments, .. } => {
            format!("    -> {name} {}", serde_json::Value::Object(arguments.clone()))
        }
        ProgressEvent::ActionCompleted {
            name, success, preview, ..
        } => {
            let status = if *success { "ok" } else { "failed" };
            format!("    <- {name}: {status} {preview}")
        }
        ProgressEvent::ContentChunk { .. } => return None,
        ProgressEvent::Done { text } => format!("\n{text}"),
        ProgressEvent::Failed { reason } => format!("  [failed] {reason}"),
    };
    Some(line)
}
