//! Drop-rate statistics.
//!
//! Each grade is a binomial proportion: `k` rewards of that grade out of
//! `n` trials. The Clopper-Pearson interval bounds the true rate using
//! Beta-distribution quantiles, computed with the inverse regularized
//! incomplete beta function so bounds stay accurate for grades as rare as
//! 1 in 1000.

use crate::analysis::CumulativePoint;
use crate::error::StatsError;
use crate::models::{Grade, GradeCounts};
use chrono::{DateTime, Utc};
use serde::Serialize;
use statrs::function::beta::inv_beta_reg;

/// Two-sided confidence interval for a proportion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

impl Interval {
    pub fn contains(&self, p: f64) -> bool {
        self.lower <= p && p <= self.upper
    }
}

/// Where the designed probability sits relative to the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Designed probability inside the interval.
    Consistent,
    /// Grade drops less often than designed.
    TooLow,
    /// Grade drops more often than designed.
    TooHigh,
}

impl Verdict {
    fn of(interval: &Interval, designed: f64) -> Self {
        if interval.contains(designed) {
            Verdict::Consistent
        } else if designed > interval.upper {
            Verdict::TooLow
        } else {
            Verdict::TooHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Consistent => "ok",
            Verdict::TooLow => "too low",
            Verdict::TooHigh => "too high",
        }
    }
}

/// Exact Clopper-Pearson interval for `successes` out of `trials`.
///
/// With `alpha = 1 - confidence` the bounds are the `alpha/2` quantile of
/// `Beta(k, n - k + 1)` and the `1 - alpha/2` quantile of `Beta(k + 1, n - k)`.
/// The lower bound is 0 when `k = 0` and the upper bound is 1 when `k = n`.
pub fn clopper_pearson(
    successes: u64,
    trials: u64,
    confidence: f64,
) -> Result<Interval, StatsError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(StatsError::InvalidConfidence(confidence));
    }
    if trials == 0 {
        return Err(StatsError::NoTrials);
    }
    if successes > trials {
        return Err(StatsError::SuccessesExceedTrials { successes, trials });
    }

    let alpha = 1.0 - confidence;
    let (k, n) = (successes as f64, trials as f64);

    let lower = if successes == 0 {
        0.0
    } else {
        beta_quantile(k, n - k + 1.0, alpha / 2.0)?
    };
    let upper = if successes == trials {
        1.0
    } else {
        beta_quantile(k + 1.0, n - k, 1.0 - alpha / 2.0)?
    };

    Ok(Interval {
        lower: lower.clamp(0.0, 1.0),
        upper: upper.clamp(0.0, 1.0),
        confidence,
    })
}

/// Quantile of `Beta(a, b)` at `p`, the inverse of the regularized
/// incomplete beta function.
fn beta_quantile(a: f64, b: f64, p: f64) -> Result<f64, StatsError> {
    if !(a > 0.0 && b > 0.0) {
        return Err(StatsError::Distribution(format!(
            "shape parameters must be positive, got ({}, {})",
            a, b
        )));
    }
    Ok(inv_beta_reg(a, b, p))
}

/// Observed drop rate of one grade checked against its design.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateCheck {
    pub grade: Grade,
    pub observed: u64,
    pub trials: u64,
    pub observed_rate: f64,
    pub designed: f64,
    pub interval: Interval,
    pub verdict: Verdict,
}

/// Check every grade's observed rate against its designed probability.
pub fn check_drop_rates(
    counts: &GradeCounts,
    confidence: f64,
) -> Result<Vec<RateCheck>, StatsError> {
    Grade::ALL
        .iter()
        .map(|&grade| {
            let observed = counts.get(grade);
            let interval = clopper_pearson(observed, counts.total_trials, confidence)?;
            let designed = grade.probability();
            Ok(RateCheck {
                grade,
                observed,
                trials: counts.total_trials,
                observed_rate: observed as f64 / counts.total_trials as f64,
                designed,
                interval,
                verdict: Verdict::of(&interval, designed),
            })
        })
        .collect()
}

/// Interval of one grade at a point of the cumulative series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingCheck {
    pub trial: usize,
    pub created_at: DateTime<Utc>,
    pub count: u64,
    pub interval: Interval,
    pub verdict: Verdict,
}

/// Confidence band of `grade` along a cumulative series.
pub fn rolling_rate_checks(
    points: &[CumulativePoint],
    grade: Grade,
    confidence: f64,
) -> Result<Vec<RollingCheck>, StatsError> {
    let designed = grade.probability();

    points
        .iter()
        .map(|point| {
            let count = point.get(grade);
            let interval = clopper_pearson(count, point.trial as u64, confidence)?;
            Ok(RollingCheck {
                trial: point.trial,
                created_at: point.created_at,
                count,
                interval,
                verdict: Verdict::of(&interval, designed),
            })
        })
        .collect()
}
