use anyhow::Result;
use clap::Parser;
use openvasp_cli::{cli, config};

use tracing_subscriber::{fmt, EnvFilter};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries command output only
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    tracing::debug!("logger initialized");

    let cli = cli::Cli::parse();
    let config = config::Config::load(cli.config_path.as_deref())?;
    cli.run(config).await
}
