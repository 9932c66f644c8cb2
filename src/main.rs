use std::process::ExitCode;

use clap::Parser;
use studiosync::adapter::inbound::cli::command::Cli;
use studiosync::adapter::inbound::cli::dispatch;
use studiosync::adapter::inbound::cli::output::{self, OutputConfig};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose, cli.color));

    match dispatch::execute(&cli).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            output::error(&e.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}
