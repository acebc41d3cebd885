//! `stepwise ask`: answer a single query in the terminal.

use std::path::Path;
use std::sync::Arc;

use stepwise_agent::AgentLoop;
use stepwise_config::AppConfig;
use stepwise_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
    trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load_with(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail fast with setup hints when no key is set
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY=...       (default provider)");
        eprintln!("    OPENAI_API_KEY=sk-...    (with STEPWISE_PROVIDER=openai)");
        eprintln!("    STEPWISE_API_KEY=...     (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = stepwise_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    let tools = Arc::new(stepwise_tools::default_registry(&config.tools));
    debug!(
        provider = %config.default_provider,
        model = %config.default_model,
        tools = tools.len(),
        "Agent assembled"
    );
    let event_bus = Arc::new(EventBus::default());

    let printer = trace.then(|| tokio::spawn(print_events(event_bus.subscribe())));

    let agent = AgentLoop::from_config(&config, provider, tools, Arc::clone(&event_bus));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut conversation = agent.conversation(query);
    let result = agent.process_with_cancel(&mut conversation, &cancel).await;

    // Dropping every sender lets the printer drain and stop.
    drop(agent);
    drop(event_bus);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    let summary = result?;
    println!("{}", summary.answer);
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => eprintln!("{}", describe(&event)),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                eprintln!("  ... {n} events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &DomainEvent) -> String {
    match event {
        DomainEvent::RoundStarted { round, .. } => format!("[round {round}]"),
        DomainEvent::StepReceived { kind, summary, .. } => format!("  {kind:>7}: {summary}"),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => {
            let status = if *success { "ok" } else { "failed" };
            format!("  tool {tool_name} {status} in {duration_ms}ms")
        }
        DomainEvent::RequestCompleted {
            rounds, tool_calls, ..
        } => format!("done after {rounds} rounds, {tool_calls} tool calls"),
        DomainEvent::RequestFailed {
            rounds,
            error_message,
            ..
        } => format!("failed after {rounds} rounds: {error_message}"),
    }
}
