//! HTTP client for the rewards API.

use crate::api::RewardsApi;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{CountsPage, RewardRecord};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest pause between two attempts of the same request.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Rewards API reached over HTTP.
pub struct HttpRewardsApi {
    base_url: String,
    http_client: reqwest::Client,
    timeout_seconds: u64,
    retries: usize,
    backoff: Duration,
}

impl HttpRewardsApi {
    /// Create a client for the API at `config.url`.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        info!("Using rewards API at {}", config.url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http_client,
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// Delay before retry number `attempt` (0-based), doubling each time.
    fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16) as u32);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// GET `path` with `query`, retrying retryable failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut attempt = 0;
        loop {
            match self.get_once(path, query).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {}. Retrying in {:?}",
                        path,
                        attempt + 1,
                        self.retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout {
                        url: url.clone(),
                        seconds: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    ApiError::Connect(self.base_url.clone())
                } else {
                    ApiError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

impl RewardsApi for HttpRewardsApi {
    async fn fetch_rewards(
        &self,
        since: &str,
        limit: usize,
    ) -> Result<Vec<RewardRecord>, ApiError> {
        let values: Vec<serde_json::Value> = self
            .get_json(
                "/items",
                &[("since", since.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(RewardRecord::decode_page(values))
    }

    async fn fetch_counts(&self, since: &str) -> Result<CountsPage, ApiError> {
        self.get_json("/count", &[("since", since.to_string())]).await
    }
}
