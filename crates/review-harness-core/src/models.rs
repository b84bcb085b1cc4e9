//! Core data types shared across Review Harness.
//!
//! These types are the vocabulary of both subsystems: [`Chunk`] flows
//! from the indexer into the vector store and the answerer, while
//! [`CodeIssue`] flows from analyzers through the aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A window of source text plus its embedding.
///
/// Created once during indexing and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Path of the file the window came from, relative to the repo root.
    pub source_path: String,
    /// The window text.
    pub text: String,
    /// Embedding returned by the provider for `text`.
    pub embedding: Vec<f32>,
}

/// Issue severity as reported by an analyzer or re-scored by the model.
///
/// Unknown labels are preserved verbatim in [`Severity::Unrecognized`] so
/// that they round-trip through JSON and rank below every known level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Hint,
    Unrecognized(String),
}

impl Severity {
    /// Parse a severity label, case-insensitively.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "ERROR" => Severity::Error,
            "WARNING" => Severity::Warning,
            "INFO" => Severity::Info,
            "HINT" => Severity::Hint,
            _ => Severity::Unrecognized(label.to_string()),
        }
    }

    /// Rank used for dedup and ordering: CRITICAL=4 down to HINT=0, unknown=-1.
    pub fn weight(&self) -> i32 {
        match self {
            Severity::Critical => 4,
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
            Severity::Hint => 0,
            Severity::Unrecognized(_) => -1,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Severity::Unrecognized(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Hint => "HINT",
            Severity::Unrecognized(s) => s,
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Severity::parse(&s)
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    CodeStyle,
    Security,
    Performance,
    Bug,
    Maintainability,
    Dependency,
    Test,
    Documentation,
    AiInsight,
    Unrecognized(String),
}

impl IssueType {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "CODE_STYLE" => IssueType::CodeStyle,
            "SECURITY" => IssueType::Security,
            "PERFORMANCE" => IssueType::Performance,
            "BUG" => IssueType::Bug,
            "MAINTAINABILITY" => IssueType::Maintainability,
            "DEPENDENCY" => IssueType::Dependency,
            "TEST" => IssueType::Test,
            "DOCUMENTATION" => IssueType::Documentation,
            "AI_INSIGHT" => IssueType::AiInsight,
            _ => IssueType::Unrecognized(label.to_string()),
        }
    }

    /// Secondary ordering rank. Types without an explicit rank sort last.
    pub fn weight(&self) -> i32 {
        match self {
            IssueType::Security => 5,
            IssueType::Bug => 4,
            IssueType::Performance => 3,
            IssueType::Maintainability => 2,
            IssueType::Dependency => 1,
            IssueType::CodeStyle => 0,
            _ => -1,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueType::CodeStyle => "CODE_STYLE",
            IssueType::Security => "SECURITY",
            IssueType::Performance => "PERFORMANCE",
            IssueType::Bug => "BUG",
            IssueType::Maintainability => "MAINTAINABILITY",
            IssueType::Dependency => "DEPENDENCY",
            IssueType::Test => "TEST",
            IssueType::Documentation => "DOCUMENTATION",
            IssueType::AiInsight => "AI_INSIGHT",
            IssueType::Unrecognized(s) => s,
        }
    }
}

impl From<String> for IssueType {
    fn from(s: String) -> Self {
        IssueType::parse(&s)
    }
}

impl From<IssueType> for String {
    fn from(t: IssueType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding produced by an analyzer.
///
/// The JSON shape matches what analyzers emit: `file`, `line`, `type`,
/// and optional fields omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIssue {
    pub title: String,
    pub description: String,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub tool: String,
    /// Code excerpt the finding refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl CodeIssue {
    /// Minimal constructor used by analyzers and tests.
    pub fn new(
        file: impl Into<String>,
        line: u32,
        description: impl Into<String>,
        severity: Severity,
        issue_type: IssueType,
        tool: impl Into<String>,
    ) -> Self {
        let description = description.into();
        Self {
            title: description.clone(),
            description,
            file: file.into(),
            line,
            column: None,
            severity,
            issue_type,
            tool: tool.into(),
            code: None,
            fix: None,
            rule_id: None,
            language: None,
        }
    }
}

/// Detect a source language from a file path.
///
/// Uses the lowercase extension, or the bare file name for well-known
/// extensionless files. Returns `"unknown"` when nothing matches.
pub fn detect_language(file_path: &str) -> &'static str {
    if file_path.is_empty() {
        return "unknown";
    }
    let path = Path::new(file_path);
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    let Some(ext) = ext else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        return match name.as_str() {
            "Dockerfile" => "dockerfile",
            "Makefile" => "makefile",
            "Gemfile" | "Rakefile" => "ruby",
            _ => "unknown",
        };
    };

    match ext.as_str() {
        "go" => "go",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" | "hh" => "cpp",
        "cs" => "csharp",
        "rs" => "rust",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "sh" | "bash" => "shell",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        "dart" => "dart",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("warning"), Severity::Warning);
        assert_eq!(Severity::parse(" Critical "), Severity::Critical);
        assert_eq!(
            Severity::parse("BLOCKER"),
            Severity::Unrecognized("BLOCKER".to_string())
        );
    }

    #[test]
    fn severity_weights() {
        assert_eq!(Severity::Critical.weight(), 4);
        assert_eq!(Severity::Hint.weight(), 0);
        assert_eq!(Severity::Unrecognized("x".into()).weight(), -1);
    }

    #[test]
    fn type_weights() {
        assert_eq!(IssueType::Security.weight(), 5);
        assert_eq!(IssueType::CodeStyle.weight(), 0);
        assert_eq!(IssueType::Test.weight(), -1);
        assert_eq!(IssueType::AiInsight.weight(), -1);
    }

    #[test]
    fn issue_json_shape() {
        let json = r#"{
            "title": "t",
            "description": "d",
            "file": "main.go",
            "line": 3,
            "severity": "error",
            "type": "BUG",
            "tool": "golangci-lint"
        }"#;
        let issue: CodeIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.issue_type, IssueType::Bug);
        assert!(issue.fix.is_none());

        let out = serde_json::to_value(&issue).unwrap();
        assert_eq!(out["severity"], "ERROR");
        assert_eq!(out["type"], "BUG");
        assert!(out.get("fix").is_none());
    }

    #[test]
    fn unknown_labels_survive_serialization() {
        let issue = CodeIssue::new(
            "a.py",
            1,
            "x",
            Severity::parse("blocker"),
            IssueType::parse("STYLE_GUIDE"),
            "flake8",
        );
        let out = serde_json::to_value(&issue).unwrap();
        assert_eq!(out["severity"], "blocker");
        assert_eq!(out["type"], "STYLE_GUIDE");
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("cmd/server/main.go"), "go");
        assert_eq!(detect_language("web/App.TSX"), "typescript");
        assert_eq!(detect_language("Dockerfile"), "dockerfile");
        assert_eq!(detect_language("LICENSE"), "unknown");
        assert_eq!(detect_language(""), "unknown");
    }
}
