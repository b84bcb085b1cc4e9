//! Repository filesystem access.
//!
//! The indexer and the fingerprint never touch `std::fs` directly: they
//! go through the [`RepoFs`] trait so tests can substitute an in-memory
//! tree. [`LocalFs`] is the real implementation, built on `walkdir` for
//! enumeration, `tokio::fs` for reads, and `git rev-parse` for the head
//! commit.
//!
//! [`ExcludeRules`] decides which enumerated files are indexed at all.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// One enumerated path below the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// `/`-separated path relative to the root.
    pub rel_path: String,
    pub is_dir: bool,
    pub modified: SystemTime,
    pub len: u64,
}

/// Recursive enumeration plus file reads.
#[async_trait]
pub trait RepoFs: Send + Sync {
    /// Every path below `root`, sorted by `rel_path`. Version-control
    /// metadata directories may be pruned.
    async fn walk(&self, root: &Path) -> io::Result<Vec<FileEntry>>;

    async fn read_file(&self, root: &Path, rel_path: &str) -> io::Result<Vec<u8>>;

    /// Latest commit of the repository at `root`, if it is one.
    async fn head_commit(&self, root: &Path) -> Option<String>;
}

const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// The local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl RepoFs for LocalFs {
    async fn walk(&self, root: &Path) -> io::Result<Vec<FileEntry>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || walk_blocking(&root))
            .await
            .map_err(io::Error::other)?
    }

    async fn read_file(&self, root: &Path, rel_path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(root.join(rel_path)).await
    }

    async fn head_commit(&self, root: &Path) -> Option<String> {
        if !root.join(".git").exists() {
            return None;
        }
        let output = tokio::process::Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(root)
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => {
                let sha = String::from_utf8_lossy(&out.stdout).trim().to_string();
                (!sha.is_empty()).then_some(sha)
            }
            Ok(out) => {
                tracing::warn!(
                    root = %root.display(),
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "git rev-parse failed, falling back to file-based fingerprint"
                );
                None
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "could not run git");
                None
            }
        }
    }
}

fn walk_blocking(root: &Path) -> io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && VCS_DIRS.iter().any(|d| e.file_name() == std::ffi::OsStr::new(d)))
        });

    // The root itself must be readable; anything deeper is skipped.
    std::fs::read_dir(root)?;

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %rel_path, error = %e, "skipping path without metadata");
                continue;
            }
        };
        entries.push(FileEntry {
            rel_path,
            is_dir: metadata.is_dir(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            len: metadata.len(),
        });
    }
    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

/// Extensions that never hold indexable text.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "svgz",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war",
    // executables and libraries
    "exe", "bin", "so", "dll", "dylib", "a", "o", "obj", "class", "pyc", "wasm",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // audio and video
    "mp3", "mp4", "wav", "ogg", "flac", "avi", "mov", "mkv", "webm",
    // data blobs
    "sqlite", "db", "gob",
];

/// Known non-text artifacts matched by file name.
const ARTIFACT_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Which files are left out of indexing and fingerprinting.
///
/// Combines version-control directories, a case-insensitive binary/media
/// extension denylist, known artifact names, and user globs.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    builtin: GlobSet,
    user: GlobSet,
}

impl ExcludeRules {
    pub fn new(user_globs: &[String]) -> Result<Self, globset::Error> {
        let mut builtin = GlobSetBuilder::new();
        for dir in VCS_DIRS {
            builtin.add(GlobBuilder::new(&format!("**/{}/**", dir)).build()?);
        }
        for ext in BINARY_EXTENSIONS {
            builtin.add(
                GlobBuilder::new(&format!("**/*.{}", ext))
                    .case_insensitive(true)
                    .build()?,
            );
        }
        for name in ARTIFACT_NAMES {
            builtin.add(
                GlobBuilder::new(&format!("**/{}", name))
                    .case_insensitive(true)
                    .build()?,
            );
        }

        let mut user = GlobSetBuilder::new();
        for pattern in user_globs {
            user.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
        }

        Ok(Self {
            builtin: builtin.build()?,
            user: user.build()?,
        })
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.builtin.is_match(rel_path) || self.user.is_match(rel_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn builtin_rules() {
        let rules = ExcludeRules::new(&[]).unwrap();
        assert!(rules.is_excluded("logo.PNG"));
        assert!(rules.is_excluded("assets/img/photo.jpeg"));
        assert!(rules.is_excluded("dist/app.tar"));
        assert!(rules.is_excluded("docs/manual.pdf"));
        assert!(rules.is_excluded("sub/.DS_Store"));
        assert!(rules.is_excluded(".git/config"));
        assert!(rules.is_excluded("vendor/mod/.git/HEAD"));
        assert!(!rules.is_excluded("main.go"));
        assert!(!rules.is_excluded("src/lib.rs"));
        assert!(!rules.is_excluded(".gitignore"));
    }

    #[test]
    fn user_globs_extend_rules() {
        let rules = ExcludeRules::new(&["vendor/**".to_string(), "*.lock".to_string()]).unwrap();
        assert!(rules.is_excluded("vendor/github.com/x/y.go"));
        assert!(rules.is_excluded("Cargo.lock"));
        assert!(!rules.is_excluded("nested/Cargo.lock"));
    }

    #[test]
    fn invalid_user_glob_is_an_error() {
        assert!(ExcludeRules::new(&["a[".to_string()]).is_err());
    }

    #[tokio::test]
    async fn local_walk_prunes_vcs_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/b.go"), "package pkg").unwrap();
        fs::write(root.join("a.go"), "package main").unwrap();

        let entries = LocalFs.walk(root).await.unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["a.go", "pkg", "pkg/b.go"]);
        assert!(entries[1].is_dir);
        assert_eq!(entries[0].len, "package main".len() as u64);

        let bytes = LocalFs.read_file(root, "pkg/b.go").await.unwrap();
        assert_eq!(bytes, b"package pkg");
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalFs.walk(&tmp.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn no_git_dir_means_no_commit() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(LocalFs.head_commit(tmp.path()).await, None);
    }
}
