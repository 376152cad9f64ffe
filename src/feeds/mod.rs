//! Feed retrieval: fetching syndication documents and turning them into entries.
//!
//! Retrieval is split in two so acquisition can be tested without a network:
//!
//! 1. **Fetching**: [`FeedFetcher`] returns the raw document body for a URI
//! 2. **Parsing**: [`parse::parse_feed`] turns the body into [`FeedEntry`] values
//!
//! [`HttpFeedFetcher`] is the production fetcher. It is a plain GET with the
//! configured timeout; redirects are followed and any non-2xx response is a
//! [`SourceError::Status`].

pub mod parse;

use crate::error::SourceError;
use crate::models::FeedEntry;
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Anything that can hand back the body of a feed URI.
pub trait FeedFetcher {
    /// Fetch the raw document at `uri`.
    async fn fetch(&self, uri: &str) -> Result<String, SourceError>;
}

/// [`FeedFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl FeedFetcher for HttpFeedFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, uri: &str) -> Result<String, SourceError> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Feed responded with non-success status"
            );
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            preview = %truncate_for_log(&body, 120),
            "Fetched feed body"
        );
        Ok(body)
    }
}

/// Fetch and parse `uri`, returning its entries in document order.
///
/// # Errors
///
/// Whatever the fetcher or parser reports, plus [`SourceError::Empty`] when
/// the document parsed but holds no entries.
pub async fn load_entries<F: FeedFetcher>(
    fetcher: &F,
    uri: &str,
) -> Result<Vec<FeedEntry>, SourceError> {
    let body = fetcher.fetch(uri).await?;
    let entries = parse::parse_feed(&body)?;
    if entries.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(entries)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher shared by selector and pipeline tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Canned response for one URI.
    pub enum Canned {
        Body(String),
        Fail(fn() -> SourceError),
    }

    /// Serves canned bodies and records every URI it was asked for.
    #[derive(Default)]
    pub struct FakeFetcher {
        responses: HashMap<String, Canned>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, uri: &str, canned: Canned) -> Self {
            self.responses.insert(uri.to_string(), canned);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl FeedFetcher for FakeFetcher {
        async fn fetch(&self, uri: &str) -> Result<String, SourceError> {
            self.calls.borrow_mut().push(uri.to_string());
            match self.responses.get(uri) {
                Some(Canned::Body(b)) => Ok(b.clone()),
                Some(Canned::Fail(make)) => Err(make()),
                None => Err(SourceError::Transport("connection refused".to_string())),
            }
        }
    }

    /// Minimal RSS 2.0 document with one item per `(title, link, description)`.
    pub fn rss(items: &[(&str, &str, &str)]) -> String {
        let mut xml = String::from("<rss version=\"2.0\"><channel><title>Fake</title>");
        for (title, link, description) in items {
            xml.push_str(&format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description><![CDATA[{description}]]></description></item>"
            ));
        }
        xml.push_str("</channel></rss>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Canned, FakeFetcher, rss};
    use super::*;

    #[tokio::test]
    async fn test_load_entries_ok() {
        let fetcher = FakeFetcher::default().with(
            "https://a.example/feed",
            Canned::Body(rss(&[("A", "https://a.example/1", "first")])),
        );
        let entries = load_entries(&fetcher, "https://a.example/feed").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_load_entries_empty_feed() {
        let fetcher = FakeFetcher::default().with("https://a.example/feed", Canned::Body(rss(&[])));
        let err = load_entries(&fetcher, "https://a.example/feed").await.unwrap_err();
        assert!(matches!(err, SourceError::Empty));
    }

    #[tokio::test]
    async fn test_load_entries_non_document() {
        let fetcher = FakeFetcher::default().with(
            "https://a.example/feed",
            Canned::Body("<html><body>Service Unavailable</body></html>".to_string()),
        );
        let err = load_entries(&fetcher, "https://a.example/feed").await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_load_entries_transport_failure() {
        let fetcher = FakeFetcher::default();
        let err = load_entries(&fetcher, "https://down.example/feed").await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
    }
}
