/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! `astm-receive`: the gateway server.
//!
//! Listens for analyzer connections, terminates the ASTM transport, and
//! forwards completed messages to the configured sinks.

use astmgate::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "astm-receive",
    author,
    version,
    about = "ASTM gateway: receives analyzer messages and forwards them to a LIS"
)]
struct Cli {
    /// Listen IP address
    #[arg(short, long, default_value = "0.0.0.0")]
    listen: String,

    /// Listen port
    #[arg(short, long, default_value_t = 4010)]
    port: u16,

    /// Output directory for message dumps; enables the file sink
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// LIS URL in the form http(s)://user:password@host/path; enables the
    /// push sink
    #[arg(short, long)]
    url: Option<String>,

    /// LIS push consumer name
    #[arg(short, long, default_value = "senaite.lis2a.import")]
    consumer: String,

    /// Delivery attempts per message when the LIS is unreachable
    #[arg(short, long, default_value_t = 3)]
    retries: u32,

    /// Delay in seconds between delivery attempts
    #[arg(short, long, default_value_t = 5)]
    delay: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut builder = GatewayBuilder::new()
        .with_listen(cli.listen)
        .with_port(cli.port);

    if let Some(output) = cli.output {
        if !output.is_dir() {
            return Err(ConfigError::OutputDirMissing(output.display().to_string()).into());
        }
        info!(dir = %output.display(), "file sink enabled");
        builder = builder.with_sink(Arc::new(FileSink::new(output)));
    }

    if let Some(url) = cli.url {
        let sink = HttpSink::new(
            &url,
            cli.consumer,
            cli.retries,
            Duration::from_secs(cli.delay),
        )?;
        info!(url = %sink.url(), "checking connection to the LIS");
        sink.probe().await?;
        info!("push sink enabled");
        builder = builder.with_sink(Arc::new(sink));
    }

    if builder.sink_count() == 0 {
        info!("no sinks configured; messages will only be logged");
    }

    builder.build()?.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "gateway failed");
            ExitCode::FAILURE
        }
    }
}
