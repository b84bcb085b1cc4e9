use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rvh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rvh");
    path
}

/// Temp workspace with a config (provider disabled, cache under the temp
/// dir) and a small Go repository.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let repo = root.join("repo");
    fs::create_dir_all(repo.join("cmd")).unwrap();
    fs::write(
        repo.join("cmd/webhook.go"),
        "package main\n\nimport \"net/http\"\n\nfunc main() {\n\thttp.HandleFunc(\"/hook\", handle)\n}\n",
    )
    .unwrap();
    fs::write(repo.join("README.md"), "# Webhook service\n").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[llm]
provider = "disabled"

[chunking]
window_chars = 128
overlap_chars = 16

[cache]
dir = "{}/cache"

[review]
comment_threshold = "warning"
diff_line_window = 3
"#,
        root.display()
    );
    let config_path = config_dir.join("rvh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, repo)
}

fn run_rvh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rvh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rvh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn write_issues(dir: &Path) -> PathBuf {
    let issues = r#"[
  {"title": "t", "description": "unused variable", "file": "cmd/webhook.go", "line": 7,
   "severity": "INFO", "type": "CODE_STYLE", "tool": "golint"},
  {"title": "t", "description": "error not checked", "file": "cmd/webhook.go", "line": 6,
   "severity": "WARNING", "type": "BUG", "tool": "errcheck"},
  {"title": "t", "description": "error not checked", "file": "cmd/webhook.go", "line": 6,
   "severity": "ERROR", "type": "BUG", "tool": "staticcheck"},
  {"title": "t", "description": "weak hash", "file": "internal/crypto.go", "line": 12,
   "severity": "CRITICAL", "type": "SECURITY", "tool": "gosec"}
]"#;
    let path = dir.join("issues.json");
    fs::write(&path, issues).unwrap();
    path
}

fn report(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, stdout))
}

// ─── Review ───

#[test]
fn test_review_dedups_orders_and_filters() {
    let (tmp, config_path, _) = setup_test_env();
    let issues = write_issues(tmp.path());

    let (stdout, stderr, success) =
        run_rvh(&config_path, &["review", issues.to_str().unwrap(), "--no-ai"]);
    assert!(success, "review failed: stdout={}, stderr={}", stdout, stderr);

    let report = report(&stdout);
    let reported = report["issues"].as_array().unwrap();
    let severities: Vec<&str> = reported
        .iter()
        .map(|i| i["severity"].as_str().unwrap())
        .collect();
    assert_eq!(severities, vec!["CRITICAL", "ERROR"]);
    assert_eq!(reported[1]["tool"], "staticcheck");

    // Summary covers every deduplicated issue, not just the reported ones.
    assert_eq!(report["summary"]["total_issues"], 3);
    assert_eq!(report["summary"]["info_count"], 1);
}

#[test]
fn test_review_threshold_override() {
    let (tmp, config_path, _) = setup_test_env();
    let issues = write_issues(tmp.path());

    let (stdout, _, success) = run_rvh(
        &config_path,
        &["review", issues.to_str().unwrap(), "--no-ai", "--threshold", "low"],
    );
    assert!(success);
    assert_eq!(report(&stdout)["issues"].as_array().unwrap().len(), 3);
}

#[test]
fn test_review_snaps_to_diff() {
    let (tmp, config_path, _) = setup_test_env();
    let issues = write_issues(tmp.path());
    let diff = tmp.path().join("pr.diff");
    fs::write(
        &diff,
        "diff --git a/cmd/webhook.go b/cmd/webhook.go\n\
         --- a/cmd/webhook.go\n\
         +++ b/cmd/webhook.go\n\
         @@ -5,2 +5,3 @@ func main() {\n\
         \x20func main() {\n\
         +\thttp.HandleFunc(\"/hook\", handle)\n\
         \x20}\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_rvh(
        &config_path,
        &[
            "review",
            issues.to_str().unwrap(),
            "--no-ai",
            "--threshold",
            "hint",
            "--diff",
            diff.to_str().unwrap(),
        ],
    );
    assert!(success, "review failed: stderr={}", stderr);

    let report = report(&stdout);
    let reported = report["issues"].as_array().unwrap();
    // internal/crypto.go is not in the diff; both webhook.go issues land on line 6.
    assert_eq!(reported.len(), 2);
    assert!(reported.iter().all(|i| i["line"] == 6));
    assert!(reported.iter().all(|i| i["file"] == "cmd/webhook.go"));
}

#[test]
fn test_review_rejects_malformed_issues() {
    let (tmp, config_path, _) = setup_test_env();
    let path = tmp.path().join("bad.json");
    fs::write(&path, "{\"not\": \"an array\"}").unwrap();

    let (_, stderr, success) = run_rvh(&config_path, &["review", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("not a JSON array of issues"));
}

// ─── Index / Ask ───

#[test]
fn test_index_without_provider_reports_skips() {
    let (tmp, config_path, repo) = setup_test_env();

    let (stdout, stderr, success) = run_rvh(&config_path, &["index", repo.to_str().unwrap()]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Chunks:      0"));
    assert!(stdout.contains("Source:      fresh index"));
    assert!(stdout.contains("2 indexed, 0 skipped"));

    // Nothing was embedded, so the next run must not load an empty index.
    let cache_dir = tmp.path().join("cache");
    let records = fs::read_dir(&cache_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(records, 0);

    let (stdout, _, success) = run_rvh(&config_path, &["index", repo.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("Source:      fresh index"));
}

#[test]
fn test_ask_without_provider_fails() {
    let (_tmp, config_path, repo) = setup_test_env();

    let (_, stderr, success) = run_rvh(
        &config_path,
        &["ask", repo.to_str().unwrap(), "Which handlers exist?"],
    );
    assert!(!success);
    assert!(stderr.contains("failed to embed question"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _, repo) = setup_test_env();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nwindow_chars = 10\noverlap_chars = 10\n").unwrap();

    let (_, stderr, success) = run_rvh(&config_path, &["index", repo.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("overlap_chars"));
}
