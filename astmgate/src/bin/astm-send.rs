/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! `astm-send`: transmits a plain-text ASTM message to a gateway.
//!
//! The companion tool for the sender role; useful for exercising a running
//! gateway or replaying captured messages.

use astmgate::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "astm-send",
    author,
    version,
    about = "Transmits a plain-text ASTM message over the E1381 transport"
)]
struct Cli {
    /// Target gateway as host, host:port, or a URL whose host:port is used
    #[arg(short, long)]
    url: String,

    /// Plain-text ASTM message file, one record per line
    #[arg(short, long)]
    input: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

async fn run(cli: Cli) -> Result<()> {
    let text = std::fs::read(&cli.input)?;
    let records = read_message_records(&text);
    if records.is_empty() {
        return Err(ConfigError::EmptyInput(cli.input.display().to_string()).into());
    }

    let addr = resolve_target(&cli.url)?;
    info!(%addr, records = records.len(), "transmitting");
    transmit(&addr, &records, SessionConfig::new()).await?;
    info!("message accepted");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .try_init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "transmission failed");
            ExitCode::FAILURE
        }
    }
}
