//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent the ability to interact with the world:
//! check the weather, run shell commands and look up market data.

pub mod shell;
pub mod stocks;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use stepwise_config::ToolsConfig;
use stepwise_core::tool::ToolRegistry;

pub use shell::RunCommandTool;
pub use stocks::{CompanyInfoTool, StockHistoryTool, StockPriceTool, TopGainersTool, YahooFinance};
pub use weather::WeatherTool;

/// Create a tool registry with every built-in tool enabled in `config`.
///
/// Security defaults:
/// - Shell: only the configured allowlist (common read-only commands by default)
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if config.weather.enabled {
        registry.register(Box::new(WeatherTool::new(&config.weather.base_url)));
    }

    if config.shell.enabled {
        registry.register(Box::new(RunCommandTool::new(
            config.shell.allowed_commands.clone(),
        )));
    }

    if config.stocks.enabled {
        let market = Arc::new(YahooFinance::new(
            &config.stocks.base_url,
            Duration::from_secs(config.stocks.http_timeout_secs),
        ));
        registry.register(Box::new(StockPriceTool::new(Arc::clone(&market))));
        registry.register(Box::new(StockHistoryTool::new(Arc::clone(&market))));
        registry.register(Box::new(TopGainersTool::new(Arc::clone(&market))));
        registry.register(Box::new(CompanyInfoTool::new(market)));
    }

    registry
}
