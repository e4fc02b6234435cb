use anyhow::Context;
use arb_collect_binance::BinanceCollector;
use arb_collect_bybit::BybitCollector;
use arb_collect_core::{CollectError, Collector, ExchangeConfig, TimeSeriesOptions};
use arb_collect_data::DatabaseClient;
use arb_collect_kraken::KrakenCollector;
use arb_collect_okx::OkxCollector;
use arb_collect_orchestrator::CollectionOrchestrator;
use arb_collect_zonda::ZondaCollector;
use chrono::{DateTime, Duration, FixedOffset};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "arb-collect")]
#[command(about = "Historical market data collection for the arbitrage dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch collection over every configured exchange
    Collect {
        /// How far back the synthesized series reaches, in minutes
        #[arg(long, default_value_t = 5)]
        lookback_mins: i64,
        /// Spacing between series samples, in seconds
        #[arg(long, default_value_t = 60)]
        interval_secs: i64,
        /// Order-book levels to keep per side
        #[arg(long, default_value_t = 10)]
        depth: usize,
    },
    /// Export stored price points for one pair to CSV
    Export {
        /// Market pair id to export
        #[arg(long)]
        pair_id: i64,
        /// Range start, ISO 8601 (e.g. "2025-01-01T00:00:00Z")
        #[arg(long)]
        from: String,
        /// Range end, ISO 8601
        #[arg(long)]
        to: String,
        /// Output file; defaults to a generated name in the current directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Collect {
            lookback_mins,
            interval_secs,
            depth,
        } => run_collection(lookback_mins, interval_secs, depth).await,
        Commands::Export {
            pair_id,
            from,
            to,
            output,
        } => export_prices(pair_id, &from, &to, output).await,
    }
}

async fn run_collection(lookback_mins: i64, interval_secs: i64, depth: usize) -> anyhow::Result<()> {
    let config = arb_collect_core::ConfigLoader::load()?;
    let store = Arc::new(
        DatabaseClient::new(&config.database.url, config.database.max_connections).await?,
    );

    let mut orchestrator = CollectionOrchestrator::new(store);
    for collector in build_collectors()? {
        orchestrator.register(collector);
    }

    let options = TimeSeriesOptions::lookback(
        Duration::minutes(lookback_mins),
        Duration::seconds(interval_secs),
    );

    match orchestrator.run(&options, depth).await {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e).context("collection run aborted")),
    }
}

/// Constructs a collector for every exchange whose credentials are present
/// in the environment. Missing credentials skip the exchange silently;
/// present-but-invalid ones are a hard error.
fn build_collectors() -> anyhow::Result<Vec<Box<dyn Collector>>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();

    if let Some(config) = ExchangeConfig::from_env("BINANCE", false) {
        collectors.push(Box::new(BinanceCollector::new(config)?));
    }
    if let Some(config) = ExchangeConfig::from_env("BYBIT", false) {
        collectors.push(Box::new(BybitCollector::new(config)?));
    }
    if let Some(config) = ExchangeConfig::from_env("KRAKEN", false) {
        collectors.push(Box::new(KrakenCollector::new(config)?));
    }
    if let Some(config) = ExchangeConfig::from_env("OKX", true) {
        collectors.push(Box::new(OkxCollector::new(config)?));
    }
    if let Some(config) = ExchangeConfig::from_env("ZONDA", false) {
        collectors.push(Box::new(ZondaCollector::new(config)?));
    }

    if collectors.is_empty() {
        tracing::warn!("no exchange credentials found in environment");
    }
    Ok(collectors)
}

async fn export_prices(
    pair_id: i64,
    from: &str,
    to: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let from: DateTime<FixedOffset> = from
        .parse()
        .with_context(|| format!("invalid --from timestamp: {from}"))?;
    let to: DateTime<FixedOffset> = to
        .parse()
        .with_context(|| format!("invalid --to timestamp: {to}"))?;

    arb_collect_data::validate_query_params(from.to_utc(), to.to_utc())?;

    let config = arb_collect_core::ConfigLoader::load()?;
    let client =
        DatabaseClient::new(&config.database.url, config.database.max_connections).await?;

    let points = client
        .query_price_points(pair_id, from.to_utc(), to.to_utc())
        .await?;
    if points.is_empty() {
        return Err(CollectError::data_unavailable(format!(
            "pair {pair_id} has no points in range"
        ))
        .into());
    }

    let path = output.unwrap_or_else(|| {
        PathBuf::from(arb_collect_data::generate_csv_filename(pair_id, from, to))
    });
    arb_collect_data::write_price_csv(&path, &points)?;

    println!("wrote {} price points to {}", points.len(), path.display());
    Ok(())
}
