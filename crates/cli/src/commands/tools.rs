//! `stepwise tools`: list the tools the agent may call.

use std::path::Path;

use stepwise_config::AppConfig;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load_with(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = stepwise_tools::default_registry(&config.tools);

    if registry.is_empty() {
        println!("No tools enabled.");
        return Ok(());
    }

    for spec in registry.specs() {
        println!("{}", spec.name);
        println!("    {}", spec.description);
        println!("    input: {}", spec.input.describe());
    }

    if config.tools.shell.enabled && !config.tools.shell.allowed_commands.is_empty() {
        println!();
        println!(
            "run_command allowlist: {}",
            config.tools.shell.allowed_commands.join(", ")
        );
    }

    Ok(())
}
