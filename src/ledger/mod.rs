//! Durable, idempotent record of every identifier confirmed valid.
//!
//! The ledger is the single shared source of truth for a (site, date)
//! context. It answers the already-done check before any network call and
//! absorbs every confirmed hit as one atomic unit: the confirmed-URL set and
//! the aggregate counters can never disagree on disk.
//!
//! # Persistence
//!
//! Two sibling JSON documents live in the context directory:
//! - [`LOG_FILE`] - confirmed URLs plus aggregate stats
//! - [`METADATA_FILE`] - per-identifier extracted fields
//!
//! Every hit triggers an immediate durable write rather than a batched one,
//! trading write amplification for crash safety: a crash mid-run loses at
//! most the single in-flight probe, never a previously confirmed record.
//!
//! Writes go through a temp-file-then-rename sequence, and the in-memory
//! state is only replaced once the rename lands. A failed write therefore
//! leaves [`Ledger::is_known`] truthful and the identifier eligible for a
//! later probe.

mod records;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

pub use records::{ArticleEntry, ContentRecord, MetadataDoc, ScrapeLog, ScrapeStats};

/// File name of the log document inside the context directory.
pub const LOG_FILE: &str = "scraping_log.json";

/// File name of the metadata document inside the context directory.
pub const METADATA_FILE: &str = "article_metadata.json";

/// Ledger persistence errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing a ledger document failed.
    #[error("IO error on ledger file {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A ledger document exists but is not valid JSON of the expected shape.
    #[error("corrupt ledger file {path}: {source}")]
    Corrupt {
        /// The file involved.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the in-memory state failed.
    #[error("failed to serialize ledger state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LedgerError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Read-only view of the ledger for reporting.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    /// Every confirmed URL, in confirmation order.
    pub confirmed_urls: Vec<String>,
    /// Aggregate counters.
    pub stats: ScrapeStats,
}

/// In-memory ledger state, guarded by the ledger mutex.
#[derive(Debug, Default)]
struct LedgerState {
    log: ScrapeLog,
    metadata: MetadataDoc,
    /// Mirror of `log.successful_urls` for O(1) membership checks.
    confirmed: HashSet<String>,
}

/// Durable idempotency and bookkeeping store for one context.
///
/// All access is serialized behind an async mutex so concurrently scanning
/// pages never interleave partial updates (the atomicity invariant holds
/// regardless of page-level parallelism).
#[derive(Debug)]
pub struct Ledger {
    log_path: PathBuf,
    metadata_path: PathBuf,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Opens (or initializes) the ledger for a context directory.
    ///
    /// Absent documents start empty; present documents are loaded once and
    /// become the in-memory truth for the whole run. A document that exists
    /// but fails to parse is an error rather than a silent reset, since
    /// starting fresh would re-probe and re-store everything the context
    /// already confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] when the directory cannot be created or a
    /// document cannot be read, [`LedgerError::Corrupt`] on a parse failure.
    #[instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| LedgerError::io(dir, e))?;

        let log_path = dir.join(LOG_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        let log: ScrapeLog = read_json_or_default(&log_path).await?;
        let metadata: MetadataDoc = read_json_or_default(&metadata_path).await?;
        let confirmed: HashSet<String> = log.successful_urls.iter().cloned().collect();

        debug!(
            confirmed = confirmed.len(),
            total_downloaded = log.stats.total_downloaded,
            "ledger loaded"
        );

        Ok(Self {
            log_path,
            metadata_path,
            state: Mutex::new(LedgerState {
                log,
                metadata,
                confirmed,
            }),
        })
    }

    /// Returns true iff this URL was confirmed in a previous or current run.
    ///
    /// Never touches the network or the filesystem.
    pub async fn is_known(&self, url: &str) -> bool {
        self.state.lock().await.confirmed.contains(url)
    }

    /// Durably appends a confirmed record and updates the aggregate counters
    /// as a single atomic unit.
    ///
    /// The metadata document is written before the log document: if the log
    /// write fails, the identifier stays unconfirmed and a later probe
    /// overwrites the orphaned metadata entry idempotently.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when either document cannot be written. The
    /// in-memory state is untouched in that case, so [`Self::is_known`] does
    /// not lie about what is on disk.
    #[instrument(skip(self, record), fields(id = record.id, page = record.page))]
    pub async fn record_hit(&self, record: &ContentRecord) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;

        if state.confirmed.contains(&record.url) {
            debug!(url = %record.url, "record already confirmed, skipping write");
            return Ok(());
        }

        // Stage the update on copies; commit to memory only after both
        // documents are durably renamed into place.
        let mut log = state.log.clone();
        let mut metadata = state.metadata.clone();

        log.successful_urls.push(record.url.clone());

        let page_key = record.page.to_string();
        let page_ids = log
            .stats
            .article_ids_by_page
            .entry(page_key.clone())
            .or_default();
        if !page_ids.contains(&record.id) {
            page_ids.push(record.id);
        }
        log.stats.last_successful_ids.insert(page_key, record.id);
        log.stats.total_downloaded += 1;
        log.stats.last_successful_date = Some(now_timestamp());

        metadata.insert(record.id.to_string(), ArticleEntry::from_record(record));

        write_json_atomic(&self.metadata_path, &metadata).await?;
        write_json_atomic(&self.log_path, &log).await?;

        state.log = log;
        state.metadata = metadata;
        state.confirmed.insert(record.url.clone());

        info!(
            id = record.id,
            page = record.page,
            total = state.log.stats.total_downloaded,
            "confirmed record persisted"
        );
        Ok(())
    }

    /// Read-only view of the confirmed set and counters.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock().await;
        LedgerSnapshot {
            confirmed_urls: state.log.successful_urls.clone(),
            stats: state.log.stats.clone(),
        }
    }
}

/// Capture timestamp in the ledger's wire format.
#[must_use]
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

async fn read_json_or_default<T>(path: &Path) -> Result<T, LedgerError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| LedgerError::Corrupt {
            path: path.to_path_buf(),
            source: e,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(LedgerError::io(path, e)),
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| LedgerError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| LedgerError::io(path, e))?;
    Ok(())
}
