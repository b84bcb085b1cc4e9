//! Repository-state fingerprint used as the cache validity key.
//!
//! A head commit is authoritative when the repository has one. Otherwise
//! the fingerprint is a SHA-256 over the sorted `(path, mtime, size)` of
//! every non-excluded file, so touching or editing any indexed file
//! changes it. The `commit:` / `files:` prefixes keep the two sources
//! from ever comparing equal.

use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::error::IndexError;
use crate::repo_fs::{ExcludeRules, RepoFs};

pub async fn repo_fingerprint(
    fs: &dyn RepoFs,
    root: &Path,
    rules: &ExcludeRules,
) -> Result<String, IndexError> {
    if let Some(sha) = fs.head_commit(root).await {
        return Ok(format!("commit:{}", sha));
    }

    tracing::info!(root = %root.display(), "no commit available, using file-based fingerprint");
    let entries = fs.walk(root).await.map_err(|source| IndexError::Fingerprint {
        root: root.to_path_buf(),
        source,
    })?;

    let mut files: Vec<_> = entries
        .iter()
        .filter(|e| !e.is_dir && !rules.is_excluded(&e.rel_path))
        .collect();
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut hasher = Sha256::new();
    for entry in files {
        let nanos = entry
            .modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        hasher.update(entry.rel_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(nanos.to_le_bytes());
        hasher.update(entry.len.to_le_bytes());
    }
    Ok(format!("files:{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo_fs::{FileEntry, LocalFs};
    use async_trait::async_trait;
    use std::fs;
    use std::io;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// One-file tree with a settable head commit and mtime.
    struct PinnedFs {
        head: Mutex<Option<String>>,
        mtime_secs: Mutex<u64>,
    }

    impl PinnedFs {
        fn new(head: Option<&str>) -> Self {
            Self {
                head: Mutex::new(head.map(String::from)),
                mtime_secs: Mutex::new(1_000),
            }
        }

        fn checkout(&self, head: Option<&str>) {
            *self.head.lock().unwrap() = head.map(String::from);
        }

        fn touch(&self, secs: u64) {
            *self.mtime_secs.lock().unwrap() = secs;
        }
    }

    #[async_trait]
    impl RepoFs for PinnedFs {
        async fn walk(&self, _root: &Path) -> io::Result<Vec<FileEntry>> {
            Ok(vec![FileEntry {
                rel_path: "main.go".into(),
                is_dir: false,
                modified: SystemTime::UNIX_EPOCH
                    + Duration::from_secs(*self.mtime_secs.lock().unwrap()),
                len: 12,
            }])
        }

        async fn read_file(&self, _root: &Path, _rel_path: &str) -> io::Result<Vec<u8>> {
            Ok(b"package main".to_vec())
        }

        async fn head_commit(&self, _root: &Path) -> Option<String> {
            self.head.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn checkout_changes_commit_fingerprint() {
        let repo = PinnedFs::new(Some("abc"));
        let rules = ExcludeRules::new(&[]).unwrap();
        let root = Path::new("/repo");
        let first = repo_fingerprint(&repo, root, &rules).await.unwrap();
        repo.checkout(Some("def"));
        let second = repo_fingerprint(&repo, root, &rules).await.unwrap();
        assert_eq!(first, "commit:abc");
        assert_eq!(second, "commit:def");
    }

    #[tokio::test]
    async fn commit_takes_precedence_over_file_state() {
        let repo = PinnedFs::new(Some("abc"));
        let rules = ExcludeRules::new(&[]).unwrap();
        let root = Path::new("/repo");
        let before = repo_fingerprint(&repo, root, &rules).await.unwrap();
        repo.touch(2_000);
        let after = repo_fingerprint(&repo, root, &rules).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn file_state_used_without_commit() {
        let repo = PinnedFs::new(None);
        let rules = ExcludeRules::new(&[]).unwrap();
        let root = Path::new("/repo");
        let before = repo_fingerprint(&repo, root, &rules).await.unwrap();
        assert!(before.starts_with("files:"));
        repo.touch(2_000);
        let after = repo_fingerprint(&repo, root, &rules).await.unwrap();
        assert_ne!(before, after);
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn stable_when_nothing_changes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.go"), "package a").unwrap();
        let rules = ExcludeRules::new(&[]).unwrap();
        let a = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        let b = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("files:"));
    }

    #[tokio::test]
    async fn mtime_change_changes_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.go");
        fs::write(&file, "package a").unwrap();
        set_mtime(&file, 1_000);
        let rules = ExcludeRules::new(&[]).unwrap();
        let before = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        set_mtime(&file, 2_000);
        let after = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn content_change_with_same_mtime_changes_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.go");
        fs::write(&file, "package a").unwrap();
        set_mtime(&file, 1_000);
        let rules = ExcludeRules::new(&[]).unwrap();
        let before = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        fs::write(&file, "package a\n\nfunc main() {}\n").unwrap();
        set_mtime(&file, 1_000);
        let after = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn excluded_files_do_not_count() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.go"), "package a").unwrap();
        let rules = ExcludeRules::new(&[]).unwrap();
        let before = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        fs::write(tmp.path().join("logo.png"), [0u8, 1, 2]).unwrap();
        let after = repo_fingerprint(&LocalFs, tmp.path(), &rules).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unreadable_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let rules = ExcludeRules::new(&[]).unwrap();
        let err = repo_fingerprint(&LocalFs, &tmp.path().join("missing"), &rules)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Fingerprint { .. }));
    }
}
