use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tradegraph::models::{StreamEvent, TradeRequest};

#[derive(Parser, Debug)]
#[command(name = "tradegraph", about = "Multi-agent trading workflow")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/tradegraph.toml")]
    config: String,

    /// Ticker symbol to analyze
    #[arg(short, long)]
    symbol: String,

    /// As-of date (YYYY-MM-DD), defaults to today
    #[arg(short, long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries one JSON event per line
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = tradegraph::load_config(&cli.config)?;
    let runner = tradegraph::build_runner(&config).context("Failed to build workflow runner")?;

    let request = TradeRequest::new(
        cli.symbol,
        cli.date.unwrap_or_else(|| Local::now().date_naive()),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next node boundary");
            on_signal.cancel();
        }
    });

    let mut run = runner.start(request, cancel.clone());
    let mut failed = false;
    while let Some(event) = run.next_event().await {
        println!("{}", serde_json::to_string(&event)?);
        if matches!(event, StreamEvent::Error { .. }) {
            failed = true;
        }
    }

    if failed {
        anyhow::bail!("Workflow ended with an error");
    }
    if cancel.is_cancelled() {
        anyhow::bail!("Workflow cancelled");
    }
    info!("Workflow finished");
    Ok(())
}
