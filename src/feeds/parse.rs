//! Syndication document parsing.
//!
//! Supports the three shapes the catalog actually serves:
//!
//! | Root element | Format | Entries |
//! |--------------|--------|---------|
//! | `<rss>` | RSS 2.0 | `channel/item` |
//! | `<rdf:RDF>` | RSS 1.0 | `item` (siblings of `channel`) |
//! | `<feed>` | Atom | `entry` |
//!
//! Atom summaries fall back from `summary` to `content` to
//! `media:group/media:description` (YouTube channel feeds).
//!
//! Entries are returned in document order. No re-sorting by date happens
//! here or anywhere downstream.

use crate::error::SourceError;
use crate::models::FeedEntry;
use quick_xml::Reader;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<String>,
    content: Option<String>,
    #[serde(rename = "media:group")]
    media_group: Option<MediaGroup>,
}

/// Media RSS block; YouTube keeps the video description here.
#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "media:description")]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl From<RssItem> for FeedEntry {
    fn from(it: RssItem) -> Self {
        FeedEntry {
            title: it.title,
            link: it.link,
            summary: it.description,
        }
    }
}

impl From<AtomEntry> for FeedEntry {
    fn from(entry: AtomEntry) -> Self {
        // rel defaults to "alternate" in Atom
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
            .or_else(|| entry.links.first())
            .and_then(|l| l.href.clone());

        FeedEntry {
            title: entry.title,
            link,
            summary: entry
                .summary
                .or(entry.content)
                .or(entry.media_group.and_then(|g| g.description)),
        }
    }
}

/// Parse a syndication document into its entries, in document order.
///
/// An empty but well-formed feed yields `Ok(vec![])`; callers decide
/// whether that counts as a failure.
///
/// # Errors
///
/// [`SourceError::Parse`] if the document is not XML, has an unknown root
/// element, or does not match the expected structure.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, SourceError> {
    let xml = scrub_html_entities_for_xml(xml);
    let root = root_element(&xml)
        .ok_or_else(|| SourceError::Parse("no root element".to_string()))?;

    let entries = match root.as_str() {
        "rss" => {
            let rss: Rss = from_str(&xml).map_err(|e| SourceError::Parse(e.to_string()))?;
            rss.channel.items.into_iter().map(FeedEntry::from).collect()
        }
        "rdf:RDF" | "RDF" => {
            let rdf: Rdf = from_str(&xml).map_err(|e| SourceError::Parse(e.to_string()))?;
            rdf.items.into_iter().map(FeedEntry::from).collect()
        }
        "feed" => {
            let feed: AtomFeed = from_str(&xml).map_err(|e| SourceError::Parse(e.to_string()))?;
            feed.entries.into_iter().map(FeedEntry::from).collect()
        }
        other => {
            return Err(SourceError::Parse(format!(
                "unrecognized root element <{other}>"
            )));
        }
    };
    Ok(entries)
}

/// Name of the first element in the document, prefix included.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Replace HTML-only entities that XML parsers reject.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
