//! Document extraction: asset reference and optional text fields.
//!
//! Extraction is a capability boundary: the prober only needs "given this
//! document, where is the asset and what text goes with it". Absence of the
//! expected structural marker is a normal, non-fatal outcome for an invalid
//! identifier, never an error.

use scraper::{Html, Selector};
use tracing::trace;

/// Fields extracted from one fetched document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Asset URL, when the document carries the expected marker.
    pub asset_url: Option<String>,
    /// Title text, when present.
    pub title: Option<String>,
    /// Body text, when present.
    pub body: Option<String>,
}

/// Extraction capability over fetched document bytes.
pub trait Extractor: Send + Sync {
    /// Extracts the asset reference and text fields from document markup.
    fn extract(&self, html: &str) -> Extraction;
}

/// CSS-selector-based extractor for the origin's article markup.
///
/// The asset marker is an `img` element with a fixed id; title and body live
/// in classed `div`s. All three selectors are configurable so the engine is
/// not welded to one site's markup.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    asset: Selector,
    title: Selector,
    body: Selector,
}

impl HtmlExtractor {
    /// Default asset selector: the article image marker.
    pub const DEFAULT_ASSET_SELECTOR: &'static str = "img#current_artical";

    /// Default title selector.
    pub const DEFAULT_TITLE_SELECTOR: &'static str = "div.article_title";

    /// Default body selector.
    pub const DEFAULT_BODY_SELECTOR: &'static str = "div.article_text";

    /// Creates an extractor with the default article selectors.
    ///
    /// # Panics
    ///
    /// Never panics: the default selectors are statically valid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_selectors(
            Self::DEFAULT_ASSET_SELECTOR,
            Self::DEFAULT_TITLE_SELECTOR,
            Self::DEFAULT_BODY_SELECTOR,
        )
        .expect("default selectors are valid")
    }

    /// Creates an extractor with custom CSS selectors.
    ///
    /// # Errors
    ///
    /// Returns the selector that failed to parse.
    pub fn with_selectors(
        asset: &str,
        title: &str,
        body: &str,
    ) -> Result<Self, String> {
        Ok(Self {
            asset: Selector::parse(asset).map_err(|e| format!("asset selector: {e}"))?,
            title: Selector::parse(title).map_err(|e| format!("title selector: {e}"))?,
            body: Selector::parse(body).map_err(|e| format!("body selector: {e}"))?,
        })
    }
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let asset_url = document
            .select(&self.asset)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        let title = document
            .select(&self.title)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let body = document
            .select(&self.body)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        trace!(
            has_asset = asset_url.is_some(),
            has_title = title.is_some(),
            has_body = body.is_some(),
            "document extracted"
        );

        Extraction {
            asset_url,
            title,
            body,
        }
    }
}
