//! Durable asset storage with deterministic naming.
//!
//! Storage writes succeed unconditionally (overwrite semantics); dedup is
//! the ledger's job, not storage's. The file name for an asset is derived
//! entirely from its (page, identifier, extension) so re-running a context
//! lands bytes in the same place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Fallback extension when the asset URL path carries none.
const DEFAULT_EXTENSION: &str = ".jpeg";

/// Storage write errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Creating a directory or writing the payload failed.
    #[error("IO error writing asset to {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Write capability for asset payloads.
///
/// Object-safe so the prober can hold `Arc<dyn AssetStore>` and tests can
/// substitute an in-memory store.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Durably writes `bytes` under `rel_path`, creating parent directories
    /// as needed. Returns the absolute path written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the write cannot complete.
    async fn write(&self, rel_path: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError>;
}

/// Filesystem-backed asset store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    #[instrument(skip(self, bytes), fields(rel = %rel_path.display(), len = bytes.len()))]
    async fn write(&self, rel_path: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.root.join(rel_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        debug!(path = %path.display(), "asset written");
        Ok(path)
    }
}

/// Deterministic asset file name for a (page, identifier) pair.
///
/// The extension is inferred from the asset URL's path segment, defaulting
/// to `.jpeg` when the source omits one.
///
/// # Examples
///
/// ```
/// use harvester_core::storage::asset_filename;
///
/// assert_eq!(
///     asset_filename(2, 348012, "https://e.test/img/348012.png"),
///     "page2_article_348012.png"
/// );
/// assert_eq!(
///     asset_filename(1, 5, "https://e.test/img/raw"),
///     "page1_article_5.jpeg"
/// );
/// ```
#[must_use]
pub fn asset_filename(page: u32, id: u64, asset_url: &str) -> String {
    let ext = extension_from_url(asset_url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("page{page}_article_{id}{ext}")
}

/// Extracts a plausible file extension (with leading dot) from a URL path.
pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index..];
    if ext.len() <= 1 || ext.len() > 12 {
        return None;
    }
    Some(ext.to_lowercase())
}
