//! `stepwise serve`: start the HTTP API server.

use std::path::Path;

use stepwise_config::AppConfig;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        AppConfig::load_with(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Stepwise Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);
    println!("   POST /chat  {{\"query\": \"...\"}}");

    stepwise_gateway::start(config).await?;

    Ok(())
}
