// In app/src/main.rs

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use app_config::{RunConfig, Settings};
use backtester::{BacktestCoordinator, RunSpec, rank_runs};
use clap::{Parser, Subcommand};
use core_types::{DateRange, Pair, Timeframe};
use data_loader::{DataLoader, LiquidityFilter};
use rayon::ThreadPoolBuilder;
use tracing_subscriber::prelude::*;

mod report;

/// Runs with fewer closed trades than this are left out of the ranking.
const MINIMUM_TRADES_THRESHOLD: u32 = 1;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Backtests trading strategies on Binance spot history.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs every (pair, strategy, parameter set) described in a run file.
    Backtest {
        /// Path to the run file.
        #[arg(short, long, default_value = "config/run.toml")]
        run: PathBuf,
    },

    /// Fetches, validates and caches one series.
    Fetch {
        /// The trading pair (e.g., "BTCUSDT").
        #[arg(short, long)]
        pair: String,

        /// The bar interval (e.g., "5m", "1h").
        #[arg(short, long)]
        timeframe: String,

        /// First day, in YYYY-MM-DD format.
        #[arg(long)]
        start: String,

        /// Last day (inclusive), in YYYY-MM-DD format.
        #[arg(long)]
        end: String,
    },

    /// Lists the most traded pairs for a quote asset that pass the liquidity filter.
    SelectPairs {
        #[arg(short, long, default_value = "USDT")]
        quote: String,

        /// How many pairs to take from the 24h volume ranking before filtering.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,

        #[arg(short, long, default_value = "1h")]
        timeframe: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings().context("Failed to load settings")?;
    init_tracing(&settings.app.log_level);

    if settings.app.worker_threads > 0 {
        tracing::info!(threads = settings.app.worker_threads, "Configuring Rayon thread pool.");
        ThreadPoolBuilder::new()
            .num_threads(settings.app.worker_threads)
            .build_global()
            .context("Failed to build Rayon thread pool")?;
    }

    let cli = Cli::parse();
    tracing::info!(environment = %settings.app.environment, "Starting backtest application");

    match cli.command {
        Commands::Backtest { run } => handle_backtest(&settings, run).await?,
        Commands::Fetch {
            pair,
            timeframe,
            start,
            end,
        } => handle_fetch(&settings, pair, &timeframe, &start, &end).await?,
        Commands::SelectPairs {
            quote,
            limit,
            timeframe,
            start,
            end,
        } => handle_select_pairs(&settings, &quote, limit, &timeframe, &start, &end).await?,
    }

    tracing::info!("Application has finished successfully.");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let level = tracing::Level::from_str(log_level).unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("hyper_util", tracing::Level::WARN)
            .with_target("reqwest", tracing::Level::WARN)
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Builds the shared loader: Binance as the source, the on-disk cache in front of it.
async fn build_loader(settings: &Settings) -> Result<(api_client::ApiClient, DataLoader)> {
    let client = api_client::new(&settings.binance)?;
    let cache = cache_store::open(&settings.cache).await?;
    tracing::info!(dir = %cache.dir().display(), "Cache store ready.");
    let loader = DataLoader::new(Arc::new(client.clone()), cache, &settings.loader);
    Ok((client, loader))
}

// --- "Backtest" Subcommand Logic ---

async fn handle_backtest(settings: &Settings, run_path: PathBuf) -> Result<()> {
    let start_time = Instant::now();
    let run_config = app_config::load_run_config(&run_path)
        .with_context(|| format!("Failed to load run file {}", run_path.display()))?;
    let range = run_config.range()?;
    let (client, loader) = build_loader(settings).await?;

    let pairs = resolve_pairs(settings, &run_config, &client, &loader, range).await?;
    if pairs.is_empty() {
        anyhow::bail!("No pairs to backtest.");
    }

    let mut strategy_configs = Vec::new();
    for config in &run_config.strategies {
        let expanded = app_config::expand_params(config)?;
        tracing::info!(strategy = %config.name, parameter_sets = expanded.len(), "Expanded parameter grid.");
        strategy_configs.extend(expanded);
    }

    let specs: Vec<RunSpec> = pairs
        .iter()
        .flat_map(|pair| {
            strategy_configs
                .iter()
                .map(|config| RunSpec::new(pair.clone(), run_config.timeframe, range, config.clone()))
        })
        .collect();
    tracing::info!(pairs = pairs.len(), runs = specs.len(), %range, "Starting backtests.");

    let coordinator = BacktestCoordinator::new(loader, settings.costs.clone());
    let report = coordinator.run(specs).await;

    report::print_run_report(&report);
    report::print_ranking(&rank_runs(&report, MINIMUM_TRADES_THRESHOLD));

    tracing::info!(duration = ?start_time.elapsed(), "Backtest job finished.");
    Ok(())
}

/// The run file's pairs, or the liquid top pairs when it asks for auto-selection.
async fn resolve_pairs(
    settings: &Settings,
    run_config: &RunConfig,
    client: &api_client::ApiClient,
    loader: &DataLoader,
    range: DateRange,
) -> Result<Vec<Pair>> {
    let listed = run_config.pairs();
    let Some(auto) = &run_config.auto_select else {
        return Ok(listed);
    };
    if !listed.is_empty() {
        tracing::warn!("Both pairs and [auto_select] are set; using the listed pairs.");
        return Ok(listed);
    }

    let candidates = client.top_pairs_by_quote_volume(&auto.quote_asset, auto.limit).await?;
    tracing::info!(quote = %auto.quote_asset, candidates = candidates.len(), "Ranked pairs by 24h quote volume.");
    let filter = LiquidityFilter::from(&settings.liquidity);
    let selection = loader
        .select_liquid_pairs(&candidates, run_config.timeframe, range, &filter)
        .await;
    report::print_selection(&selection);
    Ok(selection.pairs())
}

// --- "Fetch" Subcommand Logic ---

async fn handle_fetch(settings: &Settings, pair: String, timeframe: &str, start: &str, end: &str) -> Result<()> {
    let timeframe: Timeframe = timeframe.parse()?;
    let range = DateRange::from_dates(start, end)?;
    let pair = Pair::new(pair);
    let (_, loader) = build_loader(settings).await?;

    tracing::info!(%pair, %timeframe, %range, "Loading series.");
    let series = loader.load(&pair, timeframe, range).await?;

    let synthetic = series.len() - series.observed_bars().count();
    tracing::info!(
        bars = series.len(),
        synthetic,
        gaps = series.gaps().len(),
        "Series cached."
    );
    Ok(())
}

// --- "SelectPairs" Subcommand Logic ---

async fn handle_select_pairs(
    settings: &Settings,
    quote: &str,
    limit: usize,
    timeframe: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    let timeframe: Timeframe = timeframe.parse()?;
    let range = DateRange::from_dates(start, end)?;
    let (client, loader) = build_loader(settings).await?;

    let candidates = client.top_pairs_by_quote_volume(quote, limit).await?;
    tracing::info!(quote, candidates = candidates.len(), "Ranked pairs by 24h quote volume.");

    let filter = LiquidityFilter::from(&settings.liquidity);
    let selection = loader.select_liquid_pairs(&candidates, timeframe, range, &filter).await;
    report::print_selection(&selection);
    Ok(())
}
