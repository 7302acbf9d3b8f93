//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.lootwatch.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".lootwatch.toml";

/// Longest accepted reward-feed lookback (about a century).
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rewards API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Polling settings.
    #[serde(default)]
    pub poll: PollConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Offline demo settings.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Rewards API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the rewards API.
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on retryable failures.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Base delay of the retry backoff, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// How long responses are reused, in seconds. 0 disables caching.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_cache_ttl() -> u64 {
    15
}

/// Polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// How far back the reward feed starts on the first poll.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Cursor the count tally starts from.
    #[serde(default = "default_counts_epoch")]
    pub counts_epoch: String,

    /// Most recent rewards kept in memory.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on pages fetched by one refresh.
    #[serde(default = "default_max_pages")]
    pub max_pages_per_refresh: usize,

    /// Seconds between refreshes in watch mode.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Refreshes before watch mode stops. 0 means no limit.
    #[serde(default = "default_max_refreshes")]
    pub max_refreshes: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            counts_epoch: default_counts_epoch(),
            fetch_limit: default_fetch_limit(),
            page_size: default_page_size(),
            max_pages_per_refresh: default_max_pages(),
            interval_seconds: default_interval(),
            max_refreshes: default_max_refreshes(),
        }
    }
}

fn default_lookback_days() -> i64 {
    7
}

fn default_counts_epoch() -> String {
    "2024-03-15T00:00:00Z".to_string()
}

fn default_fetch_limit() -> usize {
    1000
}

fn default_page_size() -> usize {
    500
}

fn default_max_pages() -> usize {
    100
}

fn default_interval() -> u64 {
    15
}

fn default_max_refreshes() -> usize {
    10
}

/// Report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Confidence level of the drop-rate intervals.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Rows in the trials table.
    #[serde(default = "default_table_rows")]
    pub table_rows: usize,

    /// Trials shown in the terminal heatmap.
    #[serde(default = "default_heatmap_width")]
    pub heatmap_width: usize,

    /// Network name used in explorer links.
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            table_rows: default_table_rows(),
            heatmap_width: default_heatmap_width(),
            network: default_network(),
        }
    }
}

fn default_confidence() -> f64 {
    0.95
}

fn default_table_rows() -> usize {
    100
}

fn default_heatmap_width() -> usize {
    60
}

fn default_network() -> String {
    "randomnet".to_string()
}

/// Offline demo settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Seed of the synthetic mint stream. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Mints generated before the first refresh.
    #[serde(default = "default_initial_mints")]
    pub initial_mints: usize,

    /// Mints generated before every later refresh.
    #[serde(default = "default_mints_per_refresh")]
    pub mints_per_refresh: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: None,
            initial_mints: default_initial_mints(),
            mints_per_refresh: default_mints_per_refresh(),
        }
    }
}

fn default_initial_mints() -> usize {
    500
}

fn default_mints_per_refresh() -> usize {
    25
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.lootwatch.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.url = url.trim_end_matches('/').to_string();
        }
        if let Some(ttl) = args.ttl {
            self.api.cache_ttl_seconds = ttl;
        }

        if let Some(interval) = args.interval {
            self.poll.interval_seconds = interval;
        }
        if let Some(max_refreshes) = args.max_refreshes {
            self.poll.max_refreshes = max_refreshes;
        }
        if let Some(fetch_limit) = args.fetch_limit {
            self.poll.fetch_limit = fetch_limit;
        }

        if let Some(confidence) = args.confidence {
            self.report.confidence = confidence;
        }
        if let Some(ref network) = args.network {
            self.report.network = network.clone();
        }

        if args.seed.is_some() {
            self.demo.seed = args.seed;
        }
    }

    /// Check values that would make polling or statistics meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(self.report.confidence > 0.0 && self.report.confidence < 1.0) {
            anyhow::bail!(
                "Confidence must be between 0 and 1 (exclusive), got {}",
                self.report.confidence
            );
        }
        if self.poll.fetch_limit == 0 || self.poll.page_size == 0 {
            anyhow::bail!("fetch_limit and page_size must be at least 1");
        }
        if self.poll.max_pages_per_refresh == 0 {
            anyhow::bail!("max_pages_per_refresh must be at least 1");
        }
        if self.poll.interval_seconds == 0 {
            anyhow::bail!("interval_seconds must be at least 1");
        }
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.poll.lookback_days) {
            anyhow::bail!(
                "lookback_days must be between 0 and {}, got {}",
                MAX_LOOKBACK_DAYS,
                self.poll.lookback_days
            );
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll.lookback_days, 7);
        assert_eq!(config.poll.counts_epoch, "2024-03-15T00:00:00Z");
        assert_eq!(config.api.cache_ttl_seconds, 15);
        assert_eq!(config.report.network, "randomnet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[api]
url = "https://rewards.example.com"
retries = 5

[poll]
fetch_limit = 200
interval_seconds = 30

[report]
confidence = 0.99
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.api.url, "https://rewards.example.com");
        assert_eq!(config.api.retries, 5);
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.poll.fetch_limit, 200);
        assert_eq!(config.poll.interval_seconds, 30);
        assert_eq!(config.poll.page_size, 500);
        assert_eq!(config.report.confidence, 0.99);
        assert_eq!(config.report.table_rows, 100);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        let mut file = std::fs::File::create(dir.path().join(CONFIG_FILE)).unwrap();
        writeln!(file, "[demo]\nseed = 7\ninitial_mints = 10").unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.demo.seed, Some(7));
        assert_eq!(config.demo.initial_mints, 10);
        assert_eq!(config.demo.mints_per_refresh, 25);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[poll\nfetch_limit = ").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_validate_confidence() {
        let mut config = Config::default();
        config.report.confidence = 1.0;
        assert!(config.validate().is_err());
        config.report.confidence = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_poll_bounds() {
        let mut config = Config::default();
        config.poll.interval_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll.lookback_days = i64::MAX;
        assert!(config.validate().is_err());
        config.poll.lookback_days = -1;
        assert!(config.validate().is_err());
        config.poll.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_zero_from_file_is_rejected() {
        let toml_content = r#"
[poll]
interval_seconds = 0
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[poll]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("[demo]"));
    }
}
