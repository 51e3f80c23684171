use anyhow::Result;
use crate::config::{describe_environment, BrokerConfig, RawConfig};
use crate::probe::ConfigSummary;
use crate::report::TerminalReporter;

/// Echo the probe environment and check that it forms a valid configuration
pub async fn handle_env_command() -> Result<i32> {
    let raw = RawConfig::from_env();
    let terminal = TerminalReporter::new();

    terminal.print_environment(&describe_environment(|key| std::env::var(key).ok()))?;

    match BrokerConfig::try_from(raw) {
        Ok(config) => {
            terminal.print_config(&ConfigSummary::from(&config))?;
            println!("✅ Configuration is valid");
            Ok(0)
        }
        Err(e) => {
            println!("❌ Configuration is invalid: {}", e);
            Ok(1)
        }
    }
}
