use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sandpane::config::Config;
use sandpane::safety::dangerous_env_vars;

mod cli;

use cli::{Cli, run_command};

const DEFAULT_LOG_FILTER: &str = "sandpane=info";

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Logs go to stderr so command output on stdout stays clean.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    for var in dangerous_env_vars() {
        tracing::warn!(
            variable = %var,
            "Executed commands inherit {} from this environment",
            var
        );
    }

    run_command(cli.command, config).await
}
