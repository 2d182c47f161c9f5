//! Content-addressed cache for rendered diagrams.
//!
//! [`DiagramKey`] hashes everything that affects the rendered output, so a
//! cached entry never needs validation: a changed source or theme simply
//! produces a different key.
//!
//! Backends:
//! - [`NullCache`]: always misses (caching disabled)
//! - [`MemoryCache`]: process-local map
//! - [`FileCache`]: one file per entry under a versioned directory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::theme::Theme;

/// Diagram parameters for cache key computation.
#[derive(Debug)]
pub struct DiagramKey<'a> {
    /// Diagram source text as written by the author.
    pub source: &'a str,
    /// Kroki endpoint (e.g. "mermaid").
    pub endpoint: &'a str,
    /// Theme applied to the render.
    pub theme: &'a Theme,
    /// Whether labels are emitted as HTML (`<foreignObject>`) or SVG text.
    pub html_labels: bool,
}

impl DiagramKey<'_> {
    /// Compute a content hash for this key.
    ///
    /// SHA-256 of `"{endpoint}:{theme fingerprint}:{labels}:{source}"`,
    /// hex encoded.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let labels = if self.html_labels { "html" } else { "svg" };
        let content = format!(
            "{}:{}:{labels}:{}",
            self.endpoint,
            self.theme.fingerprint(),
            self.source
        );
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Storage for rendered SVG keyed by [`DiagramKey::compute_hash`].
///
/// Errors are never surfaced: a failed read is a miss, a failed write is
/// dropped.
pub trait DiagramCache: Send + Sync {
    /// Look up rendered markup.
    fn get(&self, key: &str) -> Option<String>;

    /// Store rendered markup, replacing any previous entry.
    fn set(&self, key: &str, markup: &str);
}

/// No-op cache. Every lookup misses.
pub struct NullCache;

impl DiagramCache for NullCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _markup: &str) {}
}

/// In-memory cache shared by all renders of one process.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagramCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, markup: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), markup.to_owned());
    }
}

/// File-based cache rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION            # cache version string
/// +-- {hash}.svg         # one entry per rendered diagram
/// ```
///
/// On construction the `VERSION` file is compared with the given version;
/// on mismatch the directory is wiped so entries from an older build (which
/// may have post-processed SVG differently) are never served.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a file cache at `root`, validating the cache version.
    ///
    /// Errors during validation are logged but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.svg"))
    }
}

impl DiagramCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.entry_path(key)).ok()
    }

    fn set(&self, key: &str, markup: &str) {
        if let Err(e) = fs::write(self.entry_path(key), markup) {
            tracing::debug!(key, error = %e, "Failed to write diagram cache entry");
        }
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("diagram cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "diagram cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no diagram cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove diagram cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create diagram cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write diagram cache VERSION file: {e}");
    }
}
