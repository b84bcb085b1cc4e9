//! Deterministic issue aggregation stages.
//!
//! The app-side aggregator runs AI re-scoring first and then hands the
//! issue list to these pure stages:
//!
//! 1. [`dedup`]: one issue per `(file, line, description)` key, keeping the
//!    highest severity weight and the earliest issue on ties.
//! 2. [`compare_issues`]: the reporting order (severity desc, type desc,
//!    file asc, line asc).
//!
//! [`filter_by_threshold`] is separate from aggregation and runs on a
//! finished result.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{CodeIssue, Severity};

/// Collapse issues sharing `(file, line, description)`.
///
/// Surviving issues keep the position of the first issue seen for their
/// key, so the output order is deterministic for a given input order.
pub fn dedup(issues: Vec<CodeIssue>) -> Vec<CodeIssue> {
    let mut slots: HashMap<(String, u32, String), usize> = HashMap::new();
    let mut kept: Vec<CodeIssue> = Vec::with_capacity(issues.len());

    for issue in issues {
        let key = (issue.file.clone(), issue.line, issue.description.clone());
        match slots.get(&key) {
            Some(&idx) => {
                if issue.severity.weight() > kept[idx].severity.weight() {
                    kept[idx] = issue;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(issue);
            }
        }
    }
    kept
}

/// Total reporting order over issues.
pub fn compare_issues(a: &CodeIssue, b: &CodeIssue) -> Ordering {
    b.severity
        .weight()
        .cmp(&a.severity.weight())
        .then_with(|| b.issue_type.weight().cmp(&a.issue_type.weight()))
        .then_with(|| a.file.cmp(&b.file))
        .then_with(|| a.line.cmp(&b.line))
}

/// Weight of a threshold name.
///
/// Accepts the five severity names plus `high`, `medium` and `low`,
/// case-insensitively. Anything else is weight 0.
pub fn threshold_weight(name: &str) -> i32 {
    match name.trim().to_ascii_lowercase().as_str() {
        "high" => Severity::Error.weight(),
        "medium" => Severity::Warning.weight(),
        "low" => Severity::Info.weight(),
        other => Severity::parse(other).weight().max(0),
    }
}

/// Issues whose severity weight is at least the threshold's.
///
/// An issue with an unrecognized severity counts as weight 0.
pub fn filter_by_threshold(issues: &[CodeIssue], threshold: &str) -> Vec<CodeIssue> {
    let min = threshold_weight(threshold);
    issues
        .iter()
        .filter(|issue| issue.severity.weight().max(0) >= min)
        .cloned()
        .collect()
}
