//! Response cache stores.
//!
//! Entries are addressed by [`StoreKey`]: the request route plus the
//! content hash. A plain `put` never touches an existing entry; only
//! `replace` overwrites one. There are no TTLs and no invalidation short
//! of clearing the whole store.
//!
//! Two stores ship:
//!   - [`MemoryCacheStore`]: a process-local map, for tests and ephemeral runs
//!   - [`FsCacheStore`]: files under `{root}/{route…}/{hex[0..2]}/{hex}`,
//!     the same two-level fan-out Git uses for objects

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use playground_core::StoreKey;
use tokio::io::AsyncWriteExt;

/// Entry count and total payload size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub entries: usize,
    pub bytes: u64,
}

/// A keyed store of encoded cache entries.
///
/// `put` on an existing key is a no-op: the first stored value wins.
/// `replace` always leaves `value` stored.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &StoreKey) -> Result<Option<Bytes>>;

    async fn put(&self, key: &StoreKey, value: Bytes) -> Result<()>;

    async fn replace(&self, key: &StoreKey, value: Bytes) -> Result<()>;

    /// Current usage, if the store can report it.
    async fn usage(&self) -> Result<Option<CacheUsage>> {
        Ok(None)
    }

    /// Drop every entry. Returns how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Short label for logs and stats.
    fn kind(&self) -> &'static str;
}

// ── Memory ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<DashMap<String, Bytes>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<Bytes>> {
        Ok(self.entries.get(&key.to_string()).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &StoreKey, value: Bytes) -> Result<()> {
        self.entries.entry(key.to_string()).or_insert(value);
        Ok(())
    }

    async fn replace(&self, key: &StoreKey, value: Bytes) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn usage(&self) -> Result<Option<CacheUsage>> {
        let bytes = self.entries.iter().map(|e| e.value().len() as u64).sum();
        Ok(Some(CacheUsage {
            entries: self.entries.len(),
            bytes,
        }))
    }

    async fn clear(&self) -> Result<usize> {
        let removed = self.entries.len();
        self.entries.clear();
        Ok(removed)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

// ── Filesystem ────────────────────────────────────────────────────────────────

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

const TMP_SUFFIX: &str = "tmp";

/// Filesystem-backed store.
#[derive(Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create cache root: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for an entry.
    fn entry_path(&self, key: &StoreKey) -> PathBuf {
        let hex = key.key().hex();
        let mut path = self.root.clone();
        for segment in key.route() {
            path.push(path_segment(segment));
        }
        path.join(&hex[0..2]).join(&hex)
    }

    /// Count stored entries.
    pub fn count(&self) -> usize {
        let mut usage = CacheUsage::default();
        walk(&self.root, &mut usage);
        usage.entries
    }

    /// Total stored bytes.
    pub fn size(&self) -> u64 {
        let mut usage = CacheUsage::default();
        walk(&self.root, &mut usage);
        usage.bytes
    }

    /// Directory walk on the blocking pool.
    async fn walk_usage(&self) -> Result<CacheUsage> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut usage = CacheUsage::default();
            walk(&root, &mut usage);
            usage
        })
        .await
        .context("usage walk panicked")
    }

    /// Atomic write: temp file in the same directory, then rename. The
    /// last rename wins.
    async fn write_entry(&self, key: &StoreKey, path: &Path, value: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create cache dir: {}", parent.display()))?;
        }

        // Unique per writer so concurrent puts of one key never share a temp file.
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("{}-{n}.{TMP_SUFFIX}", std::process::id()));
        {
            let mut file = tokio::fs::File::create(&tmp_path)
                .await
                .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
            file.write_all(&value)
                .await
                .context("failed to write entry data")?;
            file.sync_all().await.context("failed to sync entry to disk")?;
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| {
                format!("failed to rename {} to {}", tmp_path.display(), path.display())
            });
        }

        tracing::trace!(key = %key, bytes = value.len(), "entry cached");
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<Bytes>> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read entry: {}", path.display())),
        }
    }

    async fn put(&self, key: &StoreKey, value: Bytes) -> Result<()> {
        let path = self.entry_path(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        self.write_entry(key, &path, value).await
    }

    async fn replace(&self, key: &StoreKey, value: Bytes) -> Result<()> {
        let path = self.entry_path(key);
        self.write_entry(key, &path, value).await
    }

    async fn usage(&self) -> Result<Option<CacheUsage>> {
        Ok(Some(self.walk_usage().await?))
    }

    async fn clear(&self) -> Result<usize> {
        let removed = self.walk_usage().await?.entries;
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to list cache root: {}", self.root.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            if let Err(e) = result {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cache path");
            }
        }
        Ok(removed)
    }

    fn kind(&self) -> &'static str {
        "filesystem"
    }
}

/// Route segments come from request paths. Anything that is not plainly
/// safe as a directory name is hex-encoded so it can never escape the root.
fn path_segment(segment: &str) -> String {
    let safe = !segment.is_empty()
        && !segment.chars().all(|c| c == '.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if safe {
        segment.to_string()
    } else {
        format!("x{}", hex::encode(segment))
    }
}

fn walk(dir: &Path, usage: &mut CacheUsage) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            walk(&path, usage);
        } else if path.extension().and_then(|e| e.to_str()) != Some(TMP_SUFFIX) {
            usage.entries += 1;
            usage.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
}
