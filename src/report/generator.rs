//! Dashboard generation.
//!
//! [`build_dashboard`] collects everything shown for one refresh into a
//! serializable [`Dashboard`]; the `generate_*` functions render it as
//! terminal text, Markdown or JSON.

use crate::analysis::{
    check_drop_rates, count_records, cumulative_counts, distribution, grade_series,
    rolling_rate_checks, trial_heatmap, trials_table, GradeShare, Heatmap, RateCheck,
    RollingCheck, TrialRow, Verdict,
};
use crate::config::ReportConfig;
use crate::error::StatsError;
use crate::models::{Grade, GradeCounts, RewardRecord};
use crate::report::ExplorerLinks;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Rows of the rarest-grade band shown in the Markdown table.
const BAND_ROWS: usize = 10;

/// Designed probability of one grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignedProbability {
    pub grade: Grade,
    pub probability: f64,
}

/// Summary of the cumulative series over the recent-rewards window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSummary {
    /// Rewards in the window.
    pub window: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    /// Per-grade counts within the window.
    pub window_counts: GradeCounts,
    /// When the rarest grade last dropped inside the window.
    pub rarest_last_seen: Option<DateTime<Utc>>,
}

/// Everything rendered for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    /// Where the data came from: the API URL or the simulator.
    pub source: String,
    pub confidence: f64,
    /// Totals since the count epoch.
    pub metrics: GradeCounts,
    /// Rarest first.
    pub probabilities: Vec<DesignedProbability>,
    pub distribution: Vec<GradeShare>,
    /// Empty until the first trial is counted.
    pub rate_checks: Vec<RateCheck>,
    pub series: SeriesSummary,
    /// Confidence band of the rarest grade along the window.
    pub rarest_band: Vec<RollingCheck>,
    /// The most recent trials of the window.
    pub heatmap: Heatmap,
    /// Newest first.
    pub trials: Vec<TrialRow>,
}

impl Dashboard {
    /// True when some designed probability lies outside its interval.
    pub fn has_drift(&self) -> bool {
        self.drifting().next().is_some()
    }

    /// Checks whose designed probability lies outside the interval.
    pub fn drifting(&self) -> impl Iterator<Item = &RateCheck> {
        self.rate_checks
            .iter()
            .filter(|c| c.verdict != Verdict::Consistent)
    }
}

/// Build the dashboard from the recent-rewards window and the running totals.
pub fn build_dashboard(
    records: &[RewardRecord],
    totals: &GradeCounts,
    source: &str,
    config: &ReportConfig,
    now: DateTime<Utc>,
) -> Result<Dashboard> {
    let rate_checks = match check_drop_rates(totals, config.confidence) {
        Ok(checks) => checks,
        Err(StatsError::NoTrials) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let points = cumulative_counts(records);
    let rarest_band = rolling_rate_checks(&points, Grade::rarest(), config.confidence)?;

    let mut rarest_last_seen = None;
    let mut previous = 0;
    for (at, count) in grade_series(&points, Grade::rarest()) {
        if count > previous {
            rarest_last_seen = Some(at);
        }
        previous = count;
    }

    let series = SeriesSummary {
        window: records.len(),
        first: records.first().map(|r| r.created_at),
        last: records.last().map(|r| r.created_at),
        window_counts: count_records(records),
        rarest_last_seen,
    };

    let heatmap_start = records.len().saturating_sub(config.heatmap_width);
    let links = ExplorerLinks::new(config.network.as_str());

    Ok(Dashboard {
        generated_at: now,
        source: source.to_string(),
        confidence: config.confidence,
        metrics: *totals,
        probabilities: Grade::rarest_first()
            .map(|grade| DesignedProbability {
                grade,
                probability: grade.probability(),
            })
            .collect(),
        distribution: distribution(totals),
        rate_checks,
        series,
        rarest_band,
        heatmap: trial_heatmap(&records[heatmap_start..], heatmap_start + 1),
        trials: trials_table(records, config.table_rows, &links),
    })
}

/// Generate the terminal dashboard.
pub fn generate_text_dashboard(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Lootwatch  {}  ({})\n\n",
        dashboard.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        dashboard.source
    ));

    output.push_str(&format!(
        "Total trials: {}\n",
        dashboard.metrics.total_trials
    ));
    output.push_str(&format!(
        "{:<14} {:>8} {:>9} {:>9}  {:<21} {}\n",
        "Grade",
        "Count",
        "Share",
        "Designed",
        format!("{:.0}% interval", dashboard.confidence * 100.0),
        "Verdict"
    ));

    for grade in Grade::rarest_first() {
        let share = &dashboard.distribution[grade.index()];
        let (interval, verdict) = match dashboard.rate_checks.get(grade.index()) {
            Some(check) => (
                format!(
                    "[{:.4}%, {:.4}%]",
                    check.interval.lower * 100.0,
                    check.interval.upper * 100.0
                ),
                check.verdict.label(),
            ),
            None => ("-".to_string(), "-"),
        };
        output.push_str(&format!(
            "{} {:<11} {:>8} {:>8.3}% {:>8.3}%  {:<21} {}\n",
            grade.emoji(),
            grade,
            share.count,
            share.share * 100.0,
            grade.probability() * 100.0,
            interval,
            verdict
        ));
    }
    output.push('\n');

    output.push_str(&generate_text_series(&dashboard.series));
    if let Some(latest) = dashboard.rarest_band.last() {
        output.push_str(&format!(
            "{} band after {} trials: [{:.4}%, {:.4}%] ({})\n",
            Grade::rarest(),
            latest.trial,
            latest.interval.lower * 100.0,
            latest.interval.upper * 100.0,
            latest.verdict.label()
        ));
    }
    output.push('\n');

    output.push_str(&generate_text_heatmap(&dashboard.heatmap));

    if let Some(newest) = dashboard.trials.first() {
        output.push_str(&format!(
            "Latest trial #{}: {} {} {}\n",
            newest.trial,
            newest.grade.emoji(),
            newest.item_name,
            newest.txn_link
        ));
    }

    output
}

fn generate_text_series(series: &SeriesSummary) -> String {
    match (series.first, series.last) {
        (Some(first), Some(last)) => {
            let mut section = format!(
                "Window: {} rewards from {} to {}\n",
                series.window,
                first.format("%Y-%m-%d %H:%M:%S"),
                last.format("%Y-%m-%d %H:%M:%S")
            );
            match series.rarest_last_seen {
                Some(at) => section.push_str(&format!(
                    "Last {}: {}\n",
                    Grade::rarest(),
                    at.format("%Y-%m-%d %H:%M:%S")
                )),
                None => section.push_str(&format!("No {} in window\n", Grade::rarest())),
            }
            section
        }
        _ => "Window: no rewards yet\n".to_string(),
    }
}

/// One row per grade, one column per trial.
fn generate_text_heatmap(heatmap: &Heatmap) -> String {
    if heatmap.trials.is_empty() {
        return String::new();
    }

    let mut section = format!("Last {} trials:\n", heatmap.trials.len());
    for (grade, row) in heatmap.grades.iter().zip(&heatmap.cells) {
        let strip: String = row
            .iter()
            .map(|&cell| if cell == 1 { '█' } else { '·' })
            .collect();
        section.push_str(&format!("{:>10} {}\n", grade.to_string(), strip));
    }
    section.push('\n');
    section
}

/// Generate the Markdown dashboard.
pub fn generate_markdown_dashboard(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# Lootwatch Dashboard\n\n");
    output.push_str(&generate_metadata_section(dashboard));
    output.push_str(&generate_metrics_section(&dashboard.metrics));
    output.push_str(&generate_probabilities_section(&dashboard.probabilities));
    output.push_str(&generate_rate_checks_section(dashboard));
    output.push_str(&generate_series_section(dashboard));
    output.push_str(&generate_trials_section(&dashboard.trials));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", dashboard.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        dashboard.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Confidence:** {:.1}%\n\n",
        dashboard.confidence * 100.0
    ));

    section
}

fn generate_metrics_section(metrics: &GradeCounts) -> String {
    let mut section = String::new();

    section.push_str("## Metrics\n\n");
    let mut header = String::from("| **Total Trials** |");
    let mut divider = String::from("|:---:|");
    let mut values = format!("| **{}** |", metrics.total_trials);
    for grade in Grade::rarest_first() {
        header.push_str(&format!(" {} {} |", grade.emoji(), grade));
        divider.push_str(":---:|");
        values.push_str(&format!(" {} |", metrics.get(grade)));
    }
    section.push_str(&format!("{}\n{}\n{}\n\n", header, divider, values));

    section
}

fn generate_probabilities_section(probabilities: &[DesignedProbability]) -> String {
    let mut section = String::new();

    section.push_str("## Designed Probabilities\n\n");
    section.push_str("| Grade | Probability |\n");
    section.push_str("|:---|---:|\n");
    for p in probabilities {
        section.push_str(&format!(
            "| {} {} | {:.1}% |\n",
            p.grade.emoji(),
            p.grade,
            p.probability * 100.0
        ));
    }
    section.push('\n');

    section
}

fn generate_rate_checks_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();

    section.push_str("## Drop Rates\n\n");
    if dashboard.rate_checks.is_empty() {
        section.push_str("No trials counted yet.\n\n");
        return section;
    }

    section.push_str(&format!(
        "| Grade | Observed | Rate | Designed | {:.0}% Interval | Verdict |\n",
        dashboard.confidence * 100.0
    ));
    section.push_str("|:---|---:|---:|---:|:---:|:---:|\n");
    for check in dashboard.rate_checks.iter().rev() {
        section.push_str(&format!(
            "| {} {} | {} / {} | {:.3}% | {:.1}% | {:.4}% - {:.4}% | {} |\n",
            check.grade.emoji(),
            check.grade,
            check.observed,
            check.trials,
            check.observed_rate * 100.0,
            check.designed * 100.0,
            check.interval.lower * 100.0,
            check.interval.upper * 100.0,
            check.verdict.label()
        ));
    }
    section.push('\n');

    if dashboard.has_drift() {
        let grades: Vec<String> = dashboard.drifting().map(|c| c.grade.to_string()).collect();
        section.push_str(&format!(
            "> **Drift:** {} outside the {:.0}% interval\n\n",
            grades.join(", "),
            dashboard.confidence * 100.0
        ));
    }

    section
}

fn generate_series_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();
    let series = &dashboard.series;

    section.push_str("## Recent Window\n\n");
    let (Some(first), Some(last)) = (series.first, series.last) else {
        section.push_str("No rewards in the window yet.\n\n");
        return section;
    };

    section.push_str(&format!(
        "{} rewards from {} to {}.\n\n",
        series.window,
        first.format("%Y-%m-%d %H:%M:%S"),
        last.format("%Y-%m-%d %H:%M:%S")
    ));

    section.push_str("| Grade | In Window |\n");
    section.push_str("|:---|---:|\n");
    for grade in Grade::rarest_first() {
        section.push_str(&format!(
            "| {} | {} |\n",
            grade,
            series.window_counts.get(grade)
        ));
    }
    section.push('\n');

    if !dashboard.rarest_band.is_empty() {
        section.push_str(&format!("### {} Confidence Band\n\n", Grade::rarest()));
        section.push_str("| Trial | Count | Lower | Upper | Verdict |\n");
        section.push_str("|---:|---:|---:|---:|:---:|\n");
        for point in band_samples(&dashboard.rarest_band, BAND_ROWS) {
            section.push_str(&format!(
                "| {} | {} | {:.4}% | {:.4}% | {} |\n",
                point.trial,
                point.count,
                point.interval.lower * 100.0,
                point.interval.upper * 100.0,
                point.verdict.label()
            ));
        }
        section.push('\n');
    }

    section
}

/// Evenly spaced points of the band, always including the last one.
fn band_samples(band: &[RollingCheck], rows: usize) -> Vec<&RollingCheck> {
    if band.len() <= rows {
        return band.iter().collect();
    }
    let step = band.len().div_ceil(rows);
    let mut samples: Vec<&RollingCheck> = band.iter().step_by(step).collect();
    if let Some(last) = band.last() {
        if samples.last().map(|p| p.trial) != Some(last.trial) {
            samples.push(last);
        }
    }
    samples
}

fn generate_trials_section(trials: &[TrialRow]) -> String {
    let mut section = String::new();

    section.push_str("## Trials\n\n");
    if trials.is_empty() {
        section.push_str("No trials yet.\n\n");
        return section;
    }

    section.push_str("| Trial | Time | Grade | Reward | Transaction |\n");
    section.push_str("|---:|:---|:---|:---|:---|\n");
    for row in trials {
        section.push_str(&format!(
            "| {} | {} | {} {} | [{}]({}) | [view]({}) |\n",
            row.trial,
            row.created_at.format("%Y-%m-%d %H:%M:%S"),
            row.grade.emoji(),
            row.grade,
            row.item_name,
            row.reward_link,
            row.txn_link
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!("---\n\n*Generated by lootwatch v{}*\n", env!("CARGO_PKG_VERSION"))
}

/// Generate the JSON dashboard.
pub fn generate_json_dashboard(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}
