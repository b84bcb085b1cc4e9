//! `rvh review`: aggregate analyzer findings into a report.
//!
//! Reads a JSON array of issues, optionally snaps them onto the added
//! lines of a unified diff, aggregates, applies the comment threshold,
//! and prints the report as JSON on stdout.

use std::path::Path;

use anyhow::{Context, Result};
use review_harness_core::diff_lines::{snap_issues, DiffLines};
use review_harness_core::models::CodeIssue;
use tokio_util::sync::CancellationToken;

use crate::aggregator::{filter_by_threshold, ResultAggregator};
use crate::config::Config;

/// Options for [`run_review`].
#[derive(Debug, Clone)]
pub struct ReviewOptions<'a> {
    pub issues_path: &'a Path,
    pub diff_path: Option<&'a Path>,
    /// Overrides `review.comment_threshold`.
    pub threshold: Option<&'a str>,
    pub no_ai: bool,
}

pub async fn run_review(
    config: &Config,
    opts: ReviewOptions<'_>,
    cancel: &CancellationToken,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(opts.issues_path)
        .await
        .with_context(|| format!("failed to read {}", opts.issues_path.display()))?;
    let mut issues: Vec<CodeIssue> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of issues", opts.issues_path.display()))?;

    if let Some(diff_path) = opts.diff_path {
        let diff = tokio::fs::read_to_string(diff_path)
            .await
            .with_context(|| format!("failed to read {}", diff_path.display()))?;
        let before = issues.len();
        issues = snap_issues(issues, &DiffLines::parse(&diff), config.review.diff_line_window);
        tracing::info!(kept = issues.len(), dropped = before - issues.len(), "mapped issues onto diff");
    }

    let aggregator = ResultAggregator::from_config(config)?;
    let result = aggregator.aggregate(issues, !opts.no_ai, cancel).await;

    let threshold = opts.threshold.unwrap_or(&config.review.comment_threshold);
    let mut report = result.report();
    report.issues = filter_by_threshold(&result, threshold);
    tracing::info!(
        total = report.summary.total_issues,
        reported = report.issues.len(),
        threshold = %threshold,
        "review complete"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
