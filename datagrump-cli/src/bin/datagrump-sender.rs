//! Datagrump Sender - congestion-controlled datagram sender
//!
//! Sends filler datagrams to a receiver as fast as the selected strategy
//! allows, adapting the window to the acknowledgements that come back.

use anyhow::Context;
use clap::Parser;
use datagrump::{
    CongestionController, Sender, Strategy, StrategyKind, TracingObserver, Transport,
    UdpTransport,
};
use datagrump_cli::{summary_line, Config};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "datagrump-sender")]
#[command(about = "Congestion-controlled datagram sender", long_about = None)]
struct Args {
    /// Receiver host name or address
    host: String,

    /// Receiver port
    port: u16,

    /// Literal `debug` to log every datagram and ack
    #[arg(value_parser = ["debug"])]
    debug: Option<String>,

    /// Congestion-control strategy (mean-variance, loss-rate, copa, fixed)
    #[arg(short, long)]
    strategy: Option<StrategyKind>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Filler bytes per data datagram
    #[arg(long)]
    payload_size: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug.is_some() || args.verbose);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(kind) = args.strategy {
        config.sender.strategy = kind;
    }
    if let Some(size) = args.payload_size {
        config.sender.payload_size = size;
    }
    let strategy_config = config.validate()?;

    let transport = UdpTransport::connect(&args.host, args.port)?;
    tracing::info!(
        "Sending to {} with {} strategy",
        transport.peer_address()?,
        config.sender.strategy
    );

    let mut sender = Sender::new(transport, Strategy::from_config(&strategy_config))
        .with_observer(Box::new(TracingObserver))
        .with_payload_size(config.sender.payload_size)?;

    let start = Instant::now();
    let result = sender.run();

    tracing::info!(
        "{}",
        summary_line(
            &sender.summary(),
            &sender.controller().stats(),
            start.elapsed(),
            config.sender.payload_size
        )
    );

    match result {
        Ok(0) => Ok(()),
        Ok(status) => {
            tracing::error!("Sender exited with status {}", status);
            std::process::exit(status)
        }
        Err(e) => {
            tracing::error!("Sender aborted: {}", e);
            Err(e.into())
        }
    }
}
