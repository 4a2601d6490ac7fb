// src/main.rs
//
// Solana DeFi adoption analyzer.
// Fetches protocol TVL from DefiLlama, scores adoption quality,
// and prints a report or serves a live dashboard.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use solana_adoption::analytics::series_points;
use solana_adoption::cache::TvlCache;
use solana_adoption::config::{default_config_template, Config};
use solana_adoption::connectors::{DefiLlamaClient, FixtureSource};
use solana_adoption::dashboard::DashboardServer;
use solana_adoption::report::{render_series, AdoptionReport};
use solana_adoption::traits::{Refreshable, SharedTvlSource};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_DASHBOARD_PORT: u16 = 8080;

#[derive(Parser)]
#[command(name = "solana-adoption")]
#[command(about = "Adoption quality analysis for Solana DeFi protocols")]
struct Args {
    /// Mode of operation: report or dashboard
    #[arg(long, default_value = "report")]
    mode: String,

    /// Path to configuration file (TOML)
    #[arg(long, short)]
    config: Option<String>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Read saved DefiLlama responses (<slug>.json) from this directory instead of the API
    #[arg(long)]
    offline: Option<String>,

    /// Also print the TVL trend and volatility series for this protocol slug
    #[arg(long)]
    protocol: Option<String>,

    /// Serve the dashboard on the specified port (dashboard mode)
    #[arg(long)]
    dashboard: Option<u16>,

    /// Refetch data even if the cache is fresh
    #[arg(long)]
    refresh: bool,

    /// Generate a default configuration file
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        println!("{}", default_config_template());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::default(),
    };

    let default_level = config.global.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let cache = build_cache(&config, &args);

    match args.mode.as_str() {
        "report" => run_report_mode(&args, &config, cache).await,
        "dashboard" => run_dashboard_mode(&args, &config, cache).await,
        other => bail!("Unknown mode: {}. Use: report or dashboard", other),
    }
}

/// Picks the data source and wires it into a cache.
///
/// Offline runs read fixtures and never touch the on-disk cache.
fn build_cache(config: &Config, args: &Args) -> Arc<TvlCache> {
    match &args.offline {
        Some(dir) => {
            info!("Using offline data from {}", dir);
            let source: SharedTvlSource = FixtureSource::new(dir).shared();
            TvlCache::in_memory(source, config.protocols.clone())
        }
        None => {
            let source = DefiLlamaClient::with_base_url(
                &config.source.base_url,
                config.source.timeout_secs,
            )
            .shared();
            TvlCache::new(
                source,
                config.protocols.clone(),
                Some(Path::new(&config.source.cache_path)),
                config.source.stale_threshold_secs,
            )
        }
    }
}

// =============================================================================
// Report Mode: One-shot terminal output
// =============================================================================

async fn run_report_mode(args: &Args, config: &Config, cache: Arc<TvlCache>) -> Result<()> {
    let result = if args.refresh {
        cache.refresh().await
    } else {
        cache.ensure_fresh().await
    };

    if let Err(e) = result {
        if cache.is_empty() {
            bail!("Failed to load TVL data: {}", e);
        }
        warn!("Refresh failed, using cached data: {}", e);
    }

    let report = AdoptionReport::build(&cache.histories(), &config.analysis, cache.last_updated())
        .map_err(anyhow::Error::msg)?;

    if args.json {
        println!("{}", report.to_json().map_err(anyhow::Error::msg)?);
    } else {
        print!("{}", report.render_text());
    }

    if let Some(slug) = &args.protocol {
        let history = cache
            .history(slug)
            .with_context(|| format!("TVL history not available for {}", slug))?;
        let window = config.analysis.volatility_window;
        let points = series_points(&history, window);

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&points).context("Failed to serialize series")?
            );
        } else {
            println!();
            print!("{}", render_series(&history.protocol.name, &points, window));
        }
    }

    Ok(())
}

// =============================================================================
// Dashboard Mode: Live web UI
// =============================================================================

async fn run_dashboard_mode(args: &Args, config: &Config, cache: Arc<TvlCache>) -> Result<()> {
    let port = args
        .dashboard
        .or(config.global.dashboard_port)
        .unwrap_or(DEFAULT_DASHBOARD_PORT);

    println!("Dashboard available at http://localhost:{}", port);

    let server = DashboardServer::new(
        cache,
        config.analysis.clone(),
        port,
        config.global.refresh_secs,
    );
    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Dashboard server error: {}", e))
}
