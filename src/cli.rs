//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Lootwatch - drop-rate monitor for Trusted Loot Box
///
/// Polls the rewards API for minted rewards, tallies them by grade and
/// checks the observed drop rates against the designed probabilities
/// with exact (Clopper-Pearson) confidence intervals.
///
/// Examples:
///   lootwatch --api-url https://rewards.example.com
///   lootwatch --api-url https://rewards.example.com --once --format json
///   lootwatch --demo --seed 42 --max-refreshes 3
///   lootwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL of the rewards API
    ///
    /// Can also be set via API_URL env var or .lootwatch.toml config.
    #[arg(short, long, value_name = "URL", env = "API_URL")]
    pub api_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .lootwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text, markdown, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the dashboard to this file instead of stdout
    ///
    /// The file is rewritten on every refresh.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Refresh once and exit
    #[arg(long)]
    pub once: bool,

    /// Seconds between refreshes
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Stop after this many refreshes (0 = run until interrupted)
    #[arg(long, value_name = "COUNT")]
    pub max_refreshes: Option<usize>,

    /// Seconds an API response is reused before refetching
    #[arg(long, value_name = "SECS", env = "TTL")]
    pub ttl: Option<u64>,

    /// Confidence level of the drop-rate intervals (0.0 - 1.0)
    #[arg(long, value_name = "LEVEL")]
    pub confidence: Option<f64>,

    /// Most recent rewards kept for the time series and trials table
    #[arg(long, value_name = "COUNT")]
    pub fetch_limit: Option<usize>,

    /// Network name used in explorer links
    #[arg(long, value_name = "NETWORK")]
    pub network: Option<String>,

    /// Use a simulated mint stream instead of the rewards API
    #[arg(long)]
    pub demo: bool,

    /// Seed of the simulated mint stream
    #[arg(long, value_name = "SEED", requires = "demo")]
    pub seed: Option<u64>,

    /// Exit with code 2 when a designed probability falls outside its interval
    #[arg(long)]
    pub fail_on_drift: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .lootwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain terminal text (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(confidence) = self.confidence {
            if !(confidence > 0.0 && confidence < 1.0) {
                return Err("Confidence must be between 0.0 and 1.0 (exclusive)".to_string());
            }
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 second".to_string());
        }

        if self.fetch_limit == Some(0) {
            return Err("Fetch limit must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
