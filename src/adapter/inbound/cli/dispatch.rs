//! Routes parsed commands to their handlers.

use crate::adapter::inbound::cli::command::{Cli, Commands, ConfigCommand, LeadsCommand};
use crate::adapter::inbound::cli::{config, leads, summary, watch};
use crate::error::Result;
use crate::infrastructure::bootstrap::build_services;
use crate::infrastructure::config::logging::LoggingConfig;
use crate::infrastructure::config::Config;

/// Logging settings with `-v` flags applied on top of `[logging]`.
pub fn effective_logging(config: &LoggingConfig, verbose: u8) -> LoggingConfig {
    let mut logging = config.clone();
    match verbose {
        0 => {}
        1 => logging.level = "debug".into(),
        _ => logging.level = "trace".into(),
    }
    logging
}

/// Execute the parsed command line.
pub async fn execute(cli: &Cli) -> Result<()> {
    let command = match &cli.command {
        Commands::Config(ConfigCommand::Validate) => return config::execute_validate(&cli.config),
        Commands::Config(ConfigCommand::Show) => return config::execute_show(&cli.config),
        command => command,
    };

    let settings = Config::load(&cli.config)?;
    effective_logging(&settings.logging, cli.verbose).init();
    let services = build_services(&settings)?;

    match command {
        Commands::Leads(LeadsCommand::List(args)) => leads::execute_list(&services, args).await,
        Commands::Leads(LeadsCommand::Status(args)) => leads::execute_status(&services, args).await,
        Commands::Summary => summary::execute(&services).await,
        Commands::Watch(args) => watch::execute(&settings, &services, args).await,
        Commands::Config(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flags_raise_level() {
        let base = LoggingConfig::default();
        assert_eq!(effective_logging(&base, 0).level, "info");
        assert_eq!(effective_logging(&base, 1).level, "debug");
        assert_eq!(effective_logging(&base, 3).level, "trace");
        assert_eq!(effective_logging(&base, 2).format, "pretty");
    }
}
