//! Review result aggregation.
//!
//! Raw analyzer findings go through these stages, in this order:
//!
//! 1. **AI re-scoring** (optional): one completion call per issue not
//!    produced by an AI analyzer. A failed call or unusable reply leaves
//!    the issue as it was.
//! 2. **Deduplication** on `(file, line, description)`.
//! 3. **Ordering** by severity, type, file, line.
//!
//! The result is rebuilt from scratch after deduplication so its summary
//! counts reflect only surviving issues. Threshold filtering is a
//! separate step, see [`filter_by_threshold`].

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use review_harness_core::aggregate::{compare_issues, dedup};
use review_harness_core::json_recover::recover_as;
use review_harness_core::models::{CodeIssue, Severity};
use review_harness_core::result::AnalysisResult;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;
use crate::config::{Config, ReviewConfig};
use crate::llm::{create_client, Completer};

/// Knobs for [`ResultAggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// `tool` names whose findings are never re-scored.
    pub ai_tools: Vec<String>,
    /// Re-scoring calls in flight.
    pub concurrency: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        let review = ReviewConfig::default();
        Self {
            ai_tools: review.ai_tools,
            concurrency: review.scoring_concurrency,
        }
    }
}

impl From<&ReviewConfig> for AggregatorSettings {
    fn from(review: &ReviewConfig) -> Self {
        Self {
            ai_tools: review.ai_tools.clone(),
            concurrency: review.scoring_concurrency,
        }
    }
}

pub struct ResultAggregator {
    completer: Option<Arc<dyn Completer>>,
    settings: AggregatorSettings,
}

#[derive(Debug, Deserialize)]
struct Rescore {
    new_severity: String,
    #[serde(default)]
    reason: String,
}

impl ResultAggregator {
    /// `completer` is `None` when no AI provider is usable; re-scoring is
    /// then skipped regardless of the per-call flag.
    pub fn new(completer: Option<Arc<dyn Completer>>, settings: AggregatorSettings) -> Self {
        Self {
            completer,
            settings,
        }
    }

    /// Aggregator for `config`. A completer is attached only when
    /// `review.ai_scoring` is on and the provider has a credential.
    pub fn from_config(config: &Config) -> Result<Self> {
        let completer: Option<Arc<dyn Completer>> =
            if config.review.ai_scoring && config.llm.is_enabled() && config.llm.has_credential() {
                Some(create_client(&config.llm)? as Arc<dyn Completer>)
            } else {
                if config.review.ai_scoring {
                    tracing::info!("no usable AI provider, severity re-scoring disabled");
                }
                None
            };
        Ok(Self::new(completer, AggregatorSettings::from(&config.review)))
    }

    pub fn can_rescore(&self) -> bool {
        self.completer.is_some()
    }

    /// Re-score, deduplicate and order `raw`.
    pub async fn aggregate(
        &self,
        raw: Vec<CodeIssue>,
        ai_scoring: bool,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        self.aggregate_since(raw, Utc::now(), ai_scoring, cancel).await
    }

    /// Aggregate the issues collected in `result`, keeping its start time.
    pub async fn aggregate_result(
        &self,
        result: &AnalysisResult,
        ai_scoring: bool,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        self.aggregate_since(result.issues(), result.analyzed_at(), ai_scoring, cancel)
            .await
    }

    async fn aggregate_since(
        &self,
        raw: Vec<CodeIssue>,
        analyzed_at: DateTime<Utc>,
        ai_scoring: bool,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        let raw_count = raw.len();
        let scored = match (&self.completer, ai_scoring) {
            (Some(completer), true) => self.rescore_all(completer, raw, cancel).await,
            _ => raw,
        };

        let unique = dedup(scored);
        let result = AnalysisResult::with_start(analyzed_at);
        for issue in unique {
            result.add_issue(issue);
        }
        result.sort_issues_by(compare_issues);
        result.complete();
        tracing::info!(raw = raw_count, kept = result.len(), "aggregated issues");
        result
    }

    async fn rescore_all(
        &self,
        completer: &Arc<dyn Completer>,
        raw: Vec<CodeIssue>,
        cancel: &CancellationToken,
    ) -> Vec<CodeIssue> {
        stream::iter(raw.into_iter().map(|issue| async move {
            if self.is_ai_native(&issue) {
                return issue;
            }
            self.rescore_one(completer.as_ref(), issue, cancel).await
        }))
        .buffered(self.settings.concurrency.max(1))
        .collect()
        .await
    }

    async fn rescore_one(
        &self,
        completer: &dyn Completer,
        mut issue: CodeIssue,
        cancel: &CancellationToken,
    ) -> CodeIssue {
        let prompt = rescoring_prompt(&issue);
        match cancellable(cancel, completer.complete(&prompt)).await {
            Ok(Ok(reply)) => {
                if !apply_rescore(&mut issue, &reply) {
                    tracing::warn!(
                        file = %issue.file,
                        line = issue.line,
                        "unusable severity response, keeping original"
                    );
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(file = %issue.file, line = issue.line, error = %e, "severity re-scoring failed");
            }
            Err(_) => {}
        }
        issue
    }

    fn is_ai_native(&self, issue: &CodeIssue) -> bool {
        self.settings
            .ai_tools
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&issue.tool))
    }
}

/// Apply a `{new_severity, reason}` reply to `issue`.
///
/// Returns `false`, leaving the issue untouched, when the reply does not
/// parse or names an unknown severity.
pub fn apply_rescore(issue: &mut CodeIssue, reply: &str) -> bool {
    let Ok(rescore) = recover_as::<Rescore>(reply) else {
        return false;
    };
    let severity = Severity::parse(&rescore.new_severity);
    if !severity.is_recognized() {
        return false;
    }
    issue.severity = severity;
    let reason = rescore.reason.trim();
    if !reason.is_empty() {
        issue.description.push_str("\n\n**AI Justification**: ");
        issue.description.push_str(reason);
    }
    true
}

fn rescoring_prompt(issue: &CodeIssue) -> String {
    format!(
        "You are a code quality expert. Analyze the following issue and score its severity.\n\
Code Issue: \"{}\"\nFile: {}\nLine: {}\nCode Snippet:\n---\n{}\n---\n\n\
Rate the severity as one of: \"CRITICAL\", \"ERROR\", \"WARNING\", \"INFO\".\n\
A hardcoded secret is CRITICAL. A syntax error is an ERROR. A stylistic issue is INFO.\n\
Respond with a JSON object containing \"new_severity\" and \"reason\".\n\
Example: {{\"new_severity\": \"CRITICAL\", \"reason\": \"A hardcoded API key was found.\"}}\n\n\
Your response:",
        issue.description,
        issue.file,
        issue.line,
        issue.code.as_deref().unwrap_or(""),
    )
}

/// Issues in `result` at or above the named threshold, in report order.
pub fn filter_by_threshold(result: &AnalysisResult, threshold: &str) -> Vec<CodeIssue> {
    review_harness_core::aggregate::filter_by_threshold(&result.issues(), threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_harness_core::models::IssueType;

    fn issue(desc: &str) -> CodeIssue {
        CodeIssue::new("main.go", 3, desc, Severity::Warning, IssueType::Security, "gosec")
    }

    #[test]
    fn rescore_updates_severity_and_appends_reason() {
        let mut i = issue("API key in source");
        let ok = apply_rescore(
            &mut i,
            "```json\n{\"new_severity\": \"critical\", \"reason\": \"Leaks credentials.\"}\n```",
        );
        assert!(ok);
        assert_eq!(i.severity, Severity::Critical);
        assert_eq!(
            i.description,
            "API key in source\n\n**AI Justification**: Leaks credentials."
        );
    }

    #[test]
    fn unusable_reply_leaves_issue_alone() {
        let original = issue("x");
        for reply in ["no idea", r#"{"new_severity": "SEVERE", "reason": "r"}"#, r#"{"reason": "r"}"#] {
            let mut i = original.clone();
            assert!(!apply_rescore(&mut i, reply), "{reply}");
            assert_eq!(i, original);
        }
    }

    #[test]
    fn prompt_carries_issue_context() {
        let mut i = issue("Unchecked error");
        i.code = Some("f.Close()".into());
        let p = rescoring_prompt(&i);
        assert!(p.contains("Code Issue: \"Unchecked error\"\nFile: main.go\nLine: 3"));
        assert!(p.contains("---\nf.Close()\n---"));
    }

    #[tokio::test]
    async fn without_completer_only_dedups_and_orders() {
        let agg = ResultAggregator::new(None, AggregatorSettings::default());
        let mut info = issue("a");
        info.severity = Severity::Info;
        let result = agg
            .aggregate(vec![info, issue("b"), issue("b")], true, &CancellationToken::new())
            .await;
        let issues = result.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(result.summary().total_issues, 2);
        assert!(result.report().completed_at.is_some());
    }
}
