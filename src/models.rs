//! Data models that flow through a single pipeline run.
//!
//! - [`SourceCatalog`]: the ordered, deduplicated list of feed URIs to choose from
//! - [`FeedEntry`]: one entry of a parsed syndication document, as the feed wrote it
//! - [`RetrievedItem`]: the article picked by acquisition, summary reduced to plain text
//! - [`DraftPost`]: generated post text waiting to be published
//! - [`PublishReceipt`]: what the page returned after a successful publish
//!
//! Nothing here outlives the run that created it.

use crate::error::ConfigError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use url::Url;

/// Design news, tutorials, videos and community feeds used when no
/// `--feeds-file` is given.
pub const DEFAULT_FEEDS: &[&str] = &[
    // Industry news and trends
    "https://www.creativebloq.com/feeds/all",
    "https://www.itsnicethat.com/feed",
    "https://www.smashingmagazine.com/feed/",
    // Tutorial blogs
    "https://blog.spoongraphics.co.uk/feed",
    "https://design.tutsplus.com/articles.atom",
    // YouTube: Phlearn, Satori Graphics, The Futur
    "https://www.youtube.com/feeds/videos.xml?channel_id=UC47XN5gaAoH24i-hGv30GqQ",
    "https://www.youtube.com/feeds/videos.xml?channel_id=UCsItrB-6tAfoP2s2L7sL4-w",
    "https://www.youtube.com/feeds/videos.xml?channel_id=UC-b3c7kxa5vU-bnmaROgvog",
    // Reddit
    "https://www.reddit.com/r/graphic_design.rss",
    "https://www.reddit.com/r/photoshop.rss",
    "https://www.reddit.com/r/AdobeIllustrator.rss",
    // Visual inspiration
    "https://www.booooooom.com/feed/",
    "https://abduzeedo.com/rss.xml",
];

/// An ordered set of feed URIs, fixed for the lifetime of a run.
///
/// Duplicates are dropped on construction (first occurrence wins) so a
/// candidate can never be attempted twice in one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCatalog {
    uris: Vec<String>,
}

impl SourceCatalog {
    /// Build a catalog from arbitrary URIs, validating each one.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidFeedUri`] if a URI does not parse or is not http(s)
    /// - [`ConfigError::EmptyCatalog`] if no URIs remain
    pub fn new<I, S>(uris: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut validated = Vec::new();
        for uri in uris {
            let uri: String = uri.into();
            let uri = uri.trim().to_string();
            if uri.is_empty() {
                continue;
            }
            let parsed = Url::parse(&uri).map_err(|e| ConfigError::InvalidFeedUri {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidFeedUri {
                    reason: format!("unsupported scheme {:?}", parsed.scheme()),
                    uri,
                });
            }
            validated.push(uri);
        }

        let catalog = Self {
            uris: validated.into_iter().unique().collect(),
        };
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(catalog)
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self {
            uris: DEFAULT_FEEDS
                .iter()
                .map(|s| s.to_string())
                .unique()
                .collect(),
        }
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// One entry of a syndication document, in the feed's native order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Raw summary text. May still contain markup.
    pub summary: Option<String>,
}

/// The article chosen for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub title: String,
    pub link: String,
    /// Text before the first `<` of the entry's summary.
    pub summary: String,
    /// The feed URI this item came from.
    pub source: String,
}

/// Generated post body plus the link it points readers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPost {
    pub body: String,
    pub source_link: String,
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub status: u16,
    /// Post id returned by the page, when the response carried one.
    pub post_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = SourceCatalog::builtin();
        let revalidated = SourceCatalog::new(builtin.uris().to_vec()).unwrap();
        assert_eq!(builtin, revalidated);
        assert_eq!(builtin.len(), 13);
    }

    #[test]
    fn test_catalog_dedupes_preserving_order() {
        let catalog = SourceCatalog::new([
            "https://b.example/feed",
            "https://a.example/feed",
            "https://b.example/feed",
        ])
        .unwrap();
        assert_eq!(
            catalog.uris(),
            &["https://b.example/feed", "https://a.example/feed"]
        );
    }

    #[test]
    fn test_catalog_rejects_bad_uri() {
        let err = SourceCatalog::new(["not a url"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFeedUri { .. }));
    }

    #[test]
    fn test_catalog_rejects_non_http_scheme() {
        let err = SourceCatalog::new(["ftp://example.com/feed"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFeedUri { .. }));
    }

    #[test]
    fn test_catalog_rejects_empty() {
        let err = SourceCatalog::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCatalog));
        let err = SourceCatalog::new(["  ", ""]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCatalog));
    }

    #[test]
    fn test_draft_post_serialization() {
        let post = DraftPost {
            body: "Hello".to_string(),
            source_link: "https://example.com/a".to_string(),
        };
        let json = serde_json::to_string(&post).unwrap();
        assert!(json.contains("source_link"));
    }
}
