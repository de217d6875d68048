//! Omsorg relay entry point.

use anyhow::Result;
use clap::Parser;
use omsorg::config::Settings;
use omsorg::server::run_server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Omsorg - Voice-Note Relay
///
/// Turns voice recordings into diarized transcripts and structured
/// elder-friendly reports. The name "Omsorg" comes from the
/// Norwegian/Scandinavian word for "care."
#[derive(Parser, Debug)]
#[command(name = "omsorg")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("omsorg={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration once; components receive it by parameter.
    let mut settings = Settings::from_env();
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    run_server(settings).await
}
