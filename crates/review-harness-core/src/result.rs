//! The analysis aggregate root.
//!
//! [`AnalysisResult`] owns the issue sequence and its rolled-up
//! [`Summary`]. Every mutation goes through a single internal mutex, and
//! the summary is updated inside the same critical section as the issue
//! append, so counts can never drift from the issues they describe.
//! Concurrent analyzers share one result behind an `Arc` and call
//! [`AnalysisResult::add_issue`] directly.
//!
//! Readers take a consistent snapshot with [`AnalysisResult::report`]
//! once all writers have joined.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{detect_language, CodeIssue, Severity};

/// Counts derived from the current issue sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_issues: usize,
    pub critical_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub hint_count: usize,
    /// Number of distinct files with at least one issue.
    pub file_count: usize,
    pub issues_by_type: BTreeMap<String, usize>,
    pub issues_by_file: BTreeMap<String, usize>,
    pub issues_by_language: BTreeMap<String, usize>,
    pub issues_by_tool: BTreeMap<String, usize>,
}

impl Summary {
    fn record(&mut self, issue: &CodeIssue) {
        self.total_issues += 1;
        match issue.severity {
            Severity::Critical => self.critical_count += 1,
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => self.info_count += 1,
            Severity::Hint => self.hint_count += 1,
            Severity::Unrecognized(_) => {}
        }
        *self
            .issues_by_type
            .entry(issue.issue_type.to_string())
            .or_default() += 1;
        *self.issues_by_file.entry(issue.file.clone()).or_default() += 1;
        *self.issues_by_tool.entry(issue.tool.clone()).or_default() += 1;
        let language = issue
            .language
            .clone()
            .unwrap_or_else(|| detect_language(&issue.file).to_string());
        *self.issues_by_language.entry(language).or_default() += 1;
        self.file_count = self.issues_by_file.len();
    }
}

/// Serializable snapshot of an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: String,
    pub summary: Summary,
    pub issues: Vec<CodeIssue>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: f64,
}

#[derive(Debug, Default)]
struct State {
    issues: Vec<CodeIssue>,
    summary: Summary,
    completed_at: Option<DateTime<Utc>>,
}

/// Issue sequence plus derived summary, guarded by one mutex.
#[derive(Debug)]
pub struct AnalysisResult {
    id: String,
    analyzed_at: DateTime<Utc>,
    state: Mutex<State>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::with_start(Utc::now())
    }

    /// A fresh, empty result that keeps an earlier start time.
    pub fn with_start(analyzed_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: format!(
                "{}-{}",
                now.format("%Y%m%d-%H%M%S"),
                &uuid::Uuid::new_v4().simple().to_string()[..6]
            ),
            analyzed_at,
            state: Mutex::new(State::default()),
        }
    }

    /// Build a result by inserting `issues` in order.
    pub fn from_issues(issues: impl IntoIterator<Item = CodeIssue>) -> Self {
        let result = Self::new();
        for issue in issues {
            result.add_issue(issue);
        }
        result
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn analyzed_at(&self) -> DateTime<Utc> {
        self.analyzed_at
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking writer cannot leave the state half-updated: the
        // append and the summary update happen after all fallible work.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an issue and update every summary count atomically.
    ///
    /// A missing `language` is filled in from the file extension.
    pub fn add_issue(&self, mut issue: CodeIssue) {
        if issue.language.is_none() && !issue.file.is_empty() {
            issue.language = Some(detect_language(&issue.file).to_string());
        }
        let mut state = self.lock();
        state.summary.record(&issue);
        state.issues.push(issue);
    }

    pub fn len(&self) -> usize {
        self.lock().issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn issues(&self) -> Vec<CodeIssue> {
        self.lock().issues.clone()
    }

    pub fn summary(&self) -> Summary {
        self.lock().summary.clone()
    }

    /// Reorder issues in place. Counts are order-independent.
    pub fn sort_issues_by<F>(&self, compare: F)
    where
        F: FnMut(&CodeIssue, &CodeIssue) -> Ordering,
    {
        self.lock().issues.sort_by(compare);
    }

    /// Stamp completion time.
    pub fn complete(&self) {
        self.lock().completed_at = Some(Utc::now());
    }

    /// Consistent snapshot of issues, counts and timing.
    pub fn report(&self) -> AnalysisReport {
        let state = self.lock();
        let duration_seconds = state
            .completed_at
            .map(|done| (done - self.analyzed_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        AnalysisReport {
            id: self.id.clone(),
            summary: state.summary.clone(),
            issues: state.issues.clone(),
            analyzed_at: self.analyzed_at,
            completed_at: state.completed_at,
            duration_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueType;
    use std::sync::Arc;

    fn issue(file: &str, line: u32, sev: Severity, tool: &str) -> CodeIssue {
        CodeIssue::new(file, line, "d", sev, IssueType::Bug, tool)
    }

    #[test]
    fn counts_follow_insertions() {
        let r = AnalysisResult::new();
        r.add_issue(issue("main.go", 1, Severity::Critical, "golangci-lint"));
        r.add_issue(issue("main.go", 2, Severity::Warning, "golangci-lint"));
        r.add_issue(issue("app.py", 3, Severity::Info, "flake8"));
        r.add_issue(issue("app.py", 4, Severity::parse("odd"), "flake8"));

        let s = r.summary();
        assert_eq!(s.total_issues, 4);
        assert_eq!(s.critical_count, 1);
        assert_eq!(s.warning_count, 1);
        assert_eq!(s.info_count, 1);
        assert_eq!(s.file_count, 2);
        assert_eq!(s.issues_by_language["go"], 2);
        assert_eq!(s.issues_by_language["python"], 2);
        assert_eq!(s.issues_by_tool["flake8"], 2);
        assert_eq!(s.issues_by_type["BUG"], 4);
    }

    #[test]
    fn language_is_filled_in() {
        let r = AnalysisResult::new();
        r.add_issue(issue("lib.rs", 1, Severity::Hint, "clippy"));
        assert_eq!(r.issues()[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn concurrent_writers_keep_counts_consistent() {
        let r = Arc::new(AnalysisResult::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        r.add_issue(issue(&format!("f{}.go", t), i, Severity::Error, "t"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let report = r.report();
        assert_eq!(report.issues.len(), 800);
        assert_eq!(report.summary.total_issues, 800);
        assert_eq!(report.summary.error_count, 800);
        assert_eq!(report.summary.file_count, 8);
    }

    #[test]
    fn report_after_complete_has_duration() {
        let r = AnalysisResult::new();
        r.complete();
        let report = r.report();
        assert!(report.completed_at.is_some());
        assert!(report.duration_seconds >= 0.0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["total_issues"], 0);
    }
}
