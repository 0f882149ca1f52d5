//! Persisted ledger document shapes and the in-memory content record.
//!
//! The two JSON documents written by the [`Ledger`](super::Ledger) round-trip
//! exactly: external tooling (and the archive exporter) reads them as-is, so
//! field names and nesting are part of the contract and must not drift.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One confirmed content item, produced only on a successful probe.
///
/// Immutable once written: the ledger rejects a later probe of the same
/// identifier before any network call happens, so no record is ever updated
/// in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// The identifier that resolved to content.
    pub id: u64,
    /// Page the identifier belongs to.
    pub page: u32,
    /// Canonical document URL that was probed.
    pub url: String,
    /// Asset URL extracted from the document.
    pub asset_url: String,
    /// Extracted title, when the document carried one.
    pub title: Option<String>,
    /// Extracted body text, when the document carried one.
    pub body: Option<String>,
    /// Capture timestamp, `%Y-%m-%d %H:%M:%S`.
    pub captured_at: String,
    /// Where the asset bytes were durably stored.
    pub stored_at: PathBuf,
}

/// Per-identifier entry in the metadata document.
///
/// Keyed externally by the identifier rendered as a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleEntry {
    /// Document URL the entry was captured from.
    pub url: String,
    /// The confirmed identifier.
    pub article_id: u64,
    /// Extracted title; empty string when the document had none.
    #[serde(default)]
    pub title: String,
    /// Extracted body text; omitted entirely when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Capture timestamp, `%Y-%m-%d %H:%M:%S`.
    pub date_scraped: String,
}

impl ArticleEntry {
    /// Builds the metadata entry for a confirmed record.
    #[must_use]
    pub fn from_record(record: &ContentRecord) -> Self {
        Self {
            url: record.url.clone(),
            article_id: record.id,
            title: record.title.clone().unwrap_or_default(),
            content: record.body.clone(),
            date_scraped: record.captured_at.clone(),
        }
    }
}

/// Aggregate counters in the log document.
///
/// All counters are monotonic non-decreasing within a run and are updated
/// atomically with the confirmed-set insertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeStats {
    /// Total confirmed items across all runs for this context.
    #[serde(default)]
    pub total_downloaded: u64,
    /// Timestamp of the most recent confirmed item, `%Y-%m-%d %H:%M:%S`.
    #[serde(default)]
    pub last_successful_date: Option<String>,
    /// Confirmed identifiers per page, keyed by page number as a string.
    #[serde(default)]
    pub article_ids_by_page: BTreeMap<String, Vec<u64>>,
    /// Most recently confirmed identifier per page.
    #[serde(default)]
    pub last_successful_ids: BTreeMap<String, u64>,
}

/// Top-level shape of the log document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeLog {
    /// Every URL ever confirmed for this context, in confirmation order.
    #[serde(default)]
    pub successful_urls: Vec<String>,
    /// Aggregate counters.
    #[serde(default)]
    pub stats: ScrapeStats,
}

/// Metadata document: identifier (as string) to its extracted entry.
pub type MetadataDoc = BTreeMap<String, ArticleEntry>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_record() -> ContentRecord {
        ContentRecord {
            id: 348012,
            page: 2,
            url: "https://e.test/view/01-01-2026/2/348012".into(),
            asset_url: "https://e.test/assets/348012.jpeg".into(),
            title: Some("Headline".into()),
            body: None,
            captured_at: "2026-01-01 10:00:00".into(),
            stored_at: PathBuf::from("images/01-01-2026/page2_article_348012.jpeg"),
        }
    }

    #[test]
    fn test_article_entry_from_record_maps_fields() {
        let entry = ArticleEntry::from_record(&sample_record());
        assert_eq!(entry.article_id, 348012);
        assert_eq!(entry.title, "Headline");
        assert_eq!(entry.content, None);
        assert_eq!(entry.date_scraped, "2026-01-01 10:00:00");
    }

    #[test]
    fn test_article_entry_missing_title_becomes_empty_string() {
        let mut record = sample_record();
        record.title = None;
        let entry = ArticleEntry::from_record(&record);
        assert_eq!(entry.title, "");
    }

    #[test]
    fn test_article_entry_omits_absent_content_in_json() {
        let entry = ArticleEntry::from_record(&sample_record());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("content").is_none(), "absent content must be omitted");
        assert!(json.get("title").is_some());
    }

    #[test]
    fn test_scrape_log_round_trips_exact_shape() {
        let raw = r#"{
            "successful_urls": ["https://e.test/view/1/348012"],
            "stats": {
                "total_downloaded": 1,
                "last_successful_date": "2026-01-01 10:00:00",
                "article_ids_by_page": { "1": [348012] },
                "last_successful_ids": { "1": 348012 }
            }
        }"#;
        let log: ScrapeLog = serde_json::from_str(raw).unwrap();
        assert_eq!(log.stats.total_downloaded, 1);
        assert_eq!(log.stats.article_ids_by_page["1"], vec![348012]);

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["stats"]["last_successful_ids"]["1"], 348012);
        assert_eq!(json["successful_urls"][0], "https://e.test/view/1/348012");
    }

    #[test]
    fn test_scrape_log_tolerates_missing_fields() {
        let log: ScrapeLog = serde_json::from_str("{}").unwrap();
        assert!(log.successful_urls.is_empty());
        assert_eq!(log.stats.total_downloaded, 0);
        assert!(log.stats.last_successful_date.is_none());
    }
}
