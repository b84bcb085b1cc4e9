//! On-disk index cache.
//!
//! One record per repository, keyed by the SHA-256 of the repository's
//! absolute path. A record is valid only while its fingerprint equals the
//! repository's current fingerprint and was embedded by the same model;
//! anything else, including a record that fails to decode, is a miss and
//! triggers a fresh index.
//!
//! Records are JSON with embeddings stored as base64 little-endian f32 so
//! that a save/load round-trip is bit-exact.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use review_harness_core::embedding::{blob_to_vec, vec_to_blob};
use review_harness_core::models::Chunk;
use review_harness_core::store::memory::ChunkStore;
use review_harness_core::store::VectorIndex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Keyed byte-blob storage.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> io::Result<()>;

    /// `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl CacheStorage for FileCache {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!("{}.json.tmp", key));
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await
    }

    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Process-local cache, used in tests and when persistence is off.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStorage for MemoryCache {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> io::Result<()> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("memory cache lock poisoned"))?
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| io::Error::other("memory cache lock poisoned"))?
            .get(key)
            .cloned())
    }
}

/// Default cache directory: `$XDG_CACHE_HOME/review-harness`, falling
/// back to `~/.cache/review-harness` (`%LOCALAPPDATA%` on Windows).
pub fn default_cache_dir() -> Option<PathBuf> {
    cache_root_dir().map(|base| base.join("review-harness"))
}

fn cache_root_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("LOCALAPPDATA").map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME") {
            return Some(PathBuf::from(xdg));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache"))
    }
}

/// Stable cache key for a repository: SHA-256 hex of its absolute path.
pub fn cache_key(root: &Path) -> String {
    let absolute = std::fs::canonicalize(root).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    });
    let mut hasher = Sha256::new();
    hasher.update(absolute.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

const RECORD_VERSION: u32 = 2;

/// Serialized index: the fingerprint and embedding model it was built
/// with plus every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    pub fingerprint: String,
    pub embedding_model: String,
    /// Embedding width, `None` for an empty index.
    pub dims: Option<usize>,
    pub created_at: DateTime<Utc>,
    chunks: Vec<CachedChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedChunk {
    path: String,
    text: String,
    /// base64 of little-endian f32 bytes.
    embedding: String,
}

impl CacheRecord {
    pub fn new(fingerprint: &str, embedding_model: &str, store: &ChunkStore) -> Self {
        Self {
            version: RECORD_VERSION,
            fingerprint: fingerprint.to_string(),
            embedding_model: embedding_model.to_string(),
            dims: store.dims(),
            created_at: Utc::now(),
            chunks: store
                .chunks()
                .iter()
                .map(|c| CachedChunk {
                    path: c.source_path.clone(),
                    text: c.text.clone(),
                    embedding: BASE64.encode(vec_to_blob(&c.embedding)),
                })
                .collect(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode a stored record. Any malformed payload is `None`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let record: Self = serde_json::from_slice(bytes).ok()?;
        (record.version == RECORD_VERSION).then_some(record)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Rebuild the chunk store. `None` if any embedding fails to decode
    /// or the dimensions disagree with each other or with `dims`.
    pub fn into_store(self) -> Option<ChunkStore> {
        let dims = self.dims;
        let chunks = self
            .chunks
            .into_iter()
            .map(|c| {
                let blob = BASE64.decode(c.embedding.as_bytes()).ok()?;
                Some(Chunk {
                    source_path: c.path,
                    text: c.text,
                    embedding: blob_to_vec(&blob)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        let store = ChunkStore::from_chunks(chunks).ok()?;
        (store.dims() == dims).then_some(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> ChunkStore {
        ChunkStore::from_chunks(vec![
            Chunk {
                source_path: "a.go".into(),
                text: "package a".into(),
                embedding: vec![0.1, -0.2, f32::MIN_POSITIVE],
            },
            Chunk {
                source_path: "b/c.go".into(),
                text: "func ✓() {}".into(),
                embedding: vec![1.0, 0.0, 3.5],
            },
        ])
        .unwrap()
    }

    #[test]
    fn record_roundtrip_is_exact() {
        let record = CacheRecord::new("commit:abc", "text-embedding-004", &store());
        let bytes = record.encode().unwrap();
        let decoded = CacheRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.fingerprint, "commit:abc");
        assert_eq!(decoded.embedding_model, "text-embedding-004");
        assert_eq!(decoded.dims, Some(3));
        assert_eq!(decoded.into_store().unwrap(), store());
    }

    #[test]
    fn corrupt_record_is_a_miss() {
        assert!(CacheRecord::decode(b"{not json").is_none());
        let mut record = CacheRecord::new("x", "m", &store());
        record.version = 99;
        assert!(CacheRecord::decode(&record.encode().unwrap()).is_none());
    }

    #[test]
    fn bad_embedding_payload_is_a_miss() {
        let mut record = CacheRecord::new("x", "m", &store());
        record.chunks[0].embedding = "!!!".into();
        assert!(record.into_store().is_none());
    }

    #[test]
    fn declared_width_must_match_vectors() {
        let mut record = CacheRecord::new("x", "m", &store());
        record.dims = Some(1536);
        assert!(record.into_store().is_none());

        let empty = CacheRecord::new("x", "m", &ChunkStore::new());
        assert_eq!(empty.dims, None);
        assert!(empty.into_store().unwrap().is_empty());
    }

    #[test]
    fn cache_key_is_stable_and_path_specific() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        assert_eq!(cache_key(a.path()), cache_key(a.path()));
        assert_ne!(cache_key(a.path()), cache_key(b.path()));
        assert_eq!(cache_key(a.path()).len(), 64);
    }

    #[tokio::test]
    async fn file_cache_put_get() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("nested/cache"));
        assert_eq!(cache.get("k").await.unwrap(), None);
        cache.put("k", b"v1".to_vec()).await.unwrap();
        cache.put("k", b"v2".to_vec()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn memory_cache_put_get() {
        let cache = MemoryCache::new();
        cache.put("k", vec![1, 2]).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(vec![1, 2]));
        assert_eq!(cache.get("other").await.unwrap(), None);
        assert_eq!(cache.len(), 1);
    }
}
