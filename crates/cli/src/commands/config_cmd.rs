//! `stepwise config`: show configuration.

use std::path::Path;

use stepwise_config::AppConfig;

pub fn run(config_path: Option<&Path>, defaults: bool) -> Result<(), Box<dyn std::error::Error>> {
    if defaults {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    let config =
        AppConfig::load_with(Some(&path)).map_err(|e| format!("Failed to load config: {e}"))?;

    println!("# {}", path.display());
    if !config.has_api_key() {
        println!("# warning: no API key set (GEMINI_API_KEY, OPENAI_API_KEY, ...)");
    }
    print!("{}", render(&config)?);
    Ok(())
}

/// Render `config` as TOML with every secret blanked out.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut redacted = config.clone();
    if redacted.api_key.is_some() {
        redacted.api_key = Some("[REDACTED]".into());
    }
    for provider in redacted.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
    toml::to_string_pretty(&redacted)
}
