//! Lootwatch - drop-rate monitor for Trusted Loot Box rewards
//!
//! Polls a rewards API for minted rewards and per-grade counts, and checks
//! the observed drop rates against the designed probabilities.
//!
//! Exit codes:
//!   0 - Success (no drift, or no --fail-on-drift set)
//!   1 - Runtime error (config, connection, bad response, etc.)
//!   2 - A designed probability lies outside its interval with --fail-on-drift

mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod models;
mod poller;
mod report;
mod simulate;

use anyhow::{Context, Result};
use api::{CachedApi, HttpRewardsApi, RewardsApi};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use poller::{CountTally, RewardFeed};
use report::Dashboard;
use simulate::SimulatedApi;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("Lootwatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Monitor failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .lootwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the API URL, polling cadence and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Pick the data source and run the monitor. Returns the exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    if args.demo {
        let seed = config.demo.seed.unwrap_or_else(rand::random);
        let api = SimulatedApi::new(seed, Utc::now() - chrono::Duration::days(1))?;
        api.mint(config.demo.initial_mints);
        info!("Demo mode: simulated mint stream with seed {}", seed);

        let mints_per_refresh = config.demo.mints_per_refresh;
        let mint_more = || {
            let minted = api.mint(mints_per_refresh);
            debug!("Simulator at {} mints: {:?}", minted, api.tally());
        };
        let source = format!("demo, seed {}", seed);
        return monitor(&api, &config, &args, &source, mint_more).await;
    }

    if config.api.url.is_empty() {
        anyhow::bail!(
            "No rewards API URL. Pass --api-url, set API_URL or add url under [api] in {}",
            CONFIG_FILE
        );
    }

    let client = HttpRewardsApi::new(&config.api)?;
    let api = CachedApi::new(client, Duration::from_secs(config.api.cache_ttl_seconds));
    info!(
        "Polling {} (cache TTL {}s)",
        config.api.url, config.api.cache_ttl_seconds
    );

    monitor(&api, &config, &args, &config.api.url, || {}).await
}

/// Refresh, render and wait until `--once` or the refresh limit stops it.
async fn monitor<A: RewardsApi>(
    api: &A,
    config: &Config,
    args: &Args,
    source: &str,
    before_refresh: impl Fn(),
) -> Result<i32> {
    let mut feed = RewardFeed::from_config(&config.poll, Utc::now());
    let mut tally = CountTally::from_config(&config.poll);

    let max_refreshes = if args.once {
        1
    } else {
        config.poll.max_refreshes
    };
    let interval = Duration::from_secs(config.poll.interval_seconds);
    let mut refreshes = 0;
    let mut drift = false;

    loop {
        if refreshes > 0 {
            before_refresh();
        }
        refreshes += 1;

        let spinner = create_spinner(args.quiet, refreshes)?;
        let (feed_summary, tally_summary) =
            futures::future::join(feed.refresh(api), tally.refresh(api)).await;
        if let Some(ref pb) = spinner {
            pb.finish_and_clear();
        }

        debug!(
            "Refresh {}: rewards cursor {} (stalled: {}), counts cursor {} (stalled: {})",
            refreshes,
            feed.cursor(),
            feed_summary.stalled,
            tally.cursor(),
            tally_summary.stalled
        );
        let failed = !feed_summary.is_ok() || !tally_summary.is_ok();
        if failed {
            warn!("Refresh {} incomplete, showing data fetched so far", refreshes);
        }

        let dashboard = report::build_dashboard(
            feed.records(),
            tally.totals(),
            source,
            &config.report,
            Utc::now(),
        )?;
        drift = dashboard.has_drift();
        for check in dashboard.drifting() {
            warn!(
                "{} drop rate {}: designed {:.3}% outside [{:.4}%, {:.4}%]",
                check.grade,
                check.verdict.label(),
                check.designed * 100.0,
                check.interval.lower * 100.0,
                check.interval.upper * 100.0
            );
        }
        emit(&dashboard, args)?;

        if args.once && failed {
            let cause = feed_summary.error.or(tally_summary.error);
            if let Some(e) = cause {
                return Err(e).context("Refresh failed");
            }
        }

        if max_refreshes != 0 && refreshes >= max_refreshes {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    if args.fail_on_drift && drift {
        eprintln!("\n⛔ Observed drop rates drifted from the design. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Spinner shown while a refresh is in flight.
fn create_spinner(quiet: bool, refresh: usize) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Refresh {}: polling rewards and counts...", refresh));
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(pb))
}

/// Render the dashboard and write it to the output file or stdout.
fn emit(dashboard: &Dashboard, args: &Args) -> Result<()> {
    let content = match args.format {
        OutputFormat::Text => report::generate_text_dashboard(dashboard),
        OutputFormat::Markdown => report::generate_markdown_dashboard(dashboard),
        OutputFormat::Json => report::generate_json_dashboard(dashboard)?,
    };

    match args.output {
        Some(ref path) => std::fs::write(path, &content)
            .with_context(|| format!("Failed to write dashboard to {}", path.display()))?,
        None => println!("{}", content),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
