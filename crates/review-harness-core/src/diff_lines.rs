//! Map issues onto lines that exist in a unified diff.
//!
//! Review comments can only be attached to lines the change added. An
//! analyzer or the model often reports a line that is off by a few, so
//! [`DiffLines::snap`] moves it to the nearest added line within a
//! configurable window and otherwise to the first added line of the file.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::CodeIssue;

/// Added (new-side) line numbers per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffLines {
    files: BTreeMap<String, BTreeSet<u32>>,
}

impl DiffLines {
    /// Parse `git diff` style output.
    ///
    /// Files are taken from `diff --git a/x b/x` headers; hunk headers
    /// reset the new-side counter; `+` lines are recorded; `-` lines do
    /// not advance the counter. `---`/`+++` are file headers only before
    /// the first hunk of a file.
    pub fn parse(diff: &str) -> Self {
        let mut files: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        let mut current: Option<String> = None;
        let mut next_line: u32 = 0;
        let mut in_hunk = false;

        for line in diff.lines() {
            if let Some(header) = line.strip_prefix("diff --git ") {
                current = header
                    .split_whitespace()
                    .nth(1)
                    .map(|b| b.strip_prefix("b/").unwrap_or(b).to_string());
                if let Some(file) = &current {
                    files.entry(file.clone()).or_default();
                }
                in_hunk = false;
            } else if line.starts_with("@@") {
                next_line = parse_hunk_start(line).unwrap_or(1);
                in_hunk = true;
            } else if !in_hunk {
                // index, mode and ---/+++ header lines
                continue;
            } else if line.starts_with('+') {
                if let Some(file) = &current {
                    files.entry(file.clone()).or_default().insert(next_line);
                }
                next_line = next_line.saturating_add(1);
            } else if line.starts_with('-') || line.starts_with('\\') {
                continue;
            } else {
                next_line = next_line.saturating_add(1);
            }
        }
        Self { files }
    }

    pub fn contains_file(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    pub fn added_lines(&self, file: &str) -> Option<&BTreeSet<u32>> {
        self.files.get(file)
    }

    /// Nearest commentable line for `line` in `file`.
    ///
    /// Checks the exact line, then `line+d` before `line-d` for
    /// `d = 1..=window`, then the first added line. `None` when the file
    /// is absent from the diff or has no added lines.
    pub fn snap(&self, file: &str, line: u32, window: u32) -> Option<u32> {
        let lines = self.files.get(file)?;
        if lines.contains(&line) {
            return Some(line);
        }
        for d in 1..=window {
            if let Some(ahead) = line.checked_add(d) {
                if lines.contains(&ahead) {
                    return Some(ahead);
                }
            }
            if line > d && lines.contains(&(line - d)) {
                return Some(line - d);
            }
        }
        lines.first().copied()
    }
}

/// `@@ -a,b +c,d @@` → `c`.
fn parse_hunk_start(header: &str) -> Option<u32> {
    let new_side = header.split_whitespace().find(|p| p.starts_with('+'))?;
    new_side[1..].split(',').next()?.parse().ok()
}

/// Snap each issue onto the diff, dropping issues that cannot be placed.
pub fn snap_issues(issues: Vec<CodeIssue>, diff: &DiffLines, window: u32) -> Vec<CodeIssue> {
    issues
        .into_iter()
        .filter_map(|mut issue| {
            let line = diff.snap(&issue.file, issue.line, window)?;
            if line != issue.line {
                tracing::debug!(file = %issue.file, from = issue.line, to = line, "snapped issue to diff line");
            }
            issue.line = line;
            Some(issue)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueType, Severity};

    const DIFF: &str = "\
diff --git a/cmd/main.go b/cmd/main.go
index 1111111..2222222 100644
--- a/cmd/main.go
+++ b/cmd/main.go
@@ -10,4 +10,6 @@ func main() {
 \tctx := context.Background()
-\told()
+\tnewA()
+\tnewB()
 \trun(ctx)
+\tdone()
 }
diff --git a/README.md b/README.md
deleted file mode 100644
--- a/README.md
+++ /dev/null
@@ -1,2 +0,0 @@
-# Title
-text
";

    #[test]
    fn parses_added_lines() {
        let d = DiffLines::parse(DIFF);
        let lines: Vec<u32> = d.added_lines("cmd/main.go").unwrap().iter().copied().collect();
        assert_eq!(lines, vec![11, 12, 14]);
        assert!(d.contains_file("README.md"));
        assert!(d.added_lines("README.md").unwrap().is_empty());
    }

    #[test]
    fn snap_exact_then_forward_then_backward() {
        let d = DiffLines::parse(DIFF);
        assert_eq!(d.snap("cmd/main.go", 12, 3), Some(12));
        assert_eq!(d.snap("cmd/main.go", 13, 3), Some(14));
        assert_eq!(d.snap("cmd/main.go", 16, 3), Some(14));
    }

    #[test]
    fn snap_falls_back_to_first_line() {
        let d = DiffLines::parse(DIFF);
        assert_eq!(d.snap("cmd/main.go", 40, 3), Some(11));
        assert_eq!(d.snap("cmd/main.go", 16, 1), Some(11));
    }

    #[test]
    fn added_line_that_looks_like_a_header() {
        let diff = "\
diff --git a/loop.c b/loop.c
--- a/loop.c
+++ b/loop.c
@@ -1,1 +1,3 @@
 ctx
+++i;
+after
--- removed
";
        let d = DiffLines::parse(diff);
        let lines: Vec<u32> = d.added_lines("loop.c").unwrap().iter().copied().collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn snap_at_the_top_of_the_line_range() {
        let d = DiffLines::parse(DIFF);
        assert_eq!(d.snap("cmd/main.go", u32::MAX, 3), Some(11));
        assert_eq!(d.snap("cmd/main.go", u32::MAX - 1, 3), Some(11));
    }

    #[test]
    fn snap_unknown_or_empty_file() {
        let d = DiffLines::parse(DIFF);
        assert_eq!(d.snap("other.go", 1, 3), None);
        assert_eq!(d.snap("README.md", 1, 3), None);
    }

    #[test]
    fn snap_issues_drops_unplaceable() {
        let d = DiffLines::parse(DIFF);
        let issues = vec![
            CodeIssue::new("cmd/main.go", 13, "a", Severity::Error, IssueType::Bug, "t"),
            CodeIssue::new("other.go", 1, "b", Severity::Error, IssueType::Bug, "t"),
        ];
        let out = snap_issues(issues, &d, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, 14);
    }
}
