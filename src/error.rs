//! Error types for the rewards API and the drop-rate statistics.

use thiserror::Error;

/// Failure talking to the rewards API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request did not complete in time.
    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// The API host could not be reached.
    #[error("Cannot connect to rewards API at {0}. Is API_URL correct?")]
    Connect(String),

    /// The API answered with a non-success status.
    #[error("Rewards API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not what we expected.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Any other transport failure.
    #[error("Request failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout { .. } | ApiError::Connect(_) => true,
            ApiError::Status { status, .. } => {
                matches!(status, 408 | 429 | 500..=599)
            }
            ApiError::Decode { .. } | ApiError::Transport(_) => false,
        }
    }
}

/// Invalid input to an interval computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("no trials observed yet")]
    NoTrials,

    #[error("successes ({successes}) exceed trials ({trials})")]
    SuccessesExceedTrials { successes: u64, trials: u64 },

    #[error("confidence level must be between 0 and 1 (exclusive), got {0}")]
    InvalidConfidence(f64),

    #[error("beta distribution rejected parameters: {0}")]
    Distribution(String),
}

/// A grade name that matches no known tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reward grade: {0}")]
pub struct ParseGradeError(pub String);
