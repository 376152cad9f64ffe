//! Source selection: pick the latest item from the first feed that works.
//!
//! [`SourceSelector::acquire`] runs a [`BoundedAttempts`] policy over the
//! catalog. For each candidate feed it fetches and parses the document and
//! takes the **first** entry in the feed's own order. Feeds are trusted to
//! list newest first; nothing is re-sorted by date, so a feed that lists
//! oldest first will hand back its oldest entry.

use crate::attempts::{AttemptFailure, BoundedAttempts, Outcome};
use crate::error::SourceError;
use crate::feeds::{FeedFetcher, load_entries};
use crate::models::{FeedEntry, RetrievedItem, SourceCatalog};
use crate::utils::plain_summary;
use rand::Rng;
use serde::Serialize;
use tracing::{error, info, instrument};

/// Per-candidate failure, kept for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceAttempt {
    pub source: String,
    pub error: String,
}

/// Result of [`SourceSelector::acquire`].
#[derive(Debug)]
pub struct Acquisition {
    /// The chosen item, or `None` if every attempted candidate failed.
    pub item: Option<RetrievedItem>,
    /// Failed candidates in attempt order.
    pub failures: Vec<SourceAttempt>,
    /// Number of candidates attempted.
    pub attempts: usize,
}

/// Chooses a feed from the catalog and returns its most recent entry.
pub struct SourceSelector<F> {
    fetcher: F,
}

impl<F: FeedFetcher> SourceSelector<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Try up to `max_attempts` distinct feeds and return the first usable item.
    ///
    /// Connection failures, non-document responses, empty feeds and entries
    /// missing a title or link all count as a failed candidate. None of them
    /// propagate: exhaustion is reported as `item: None`.
    #[instrument(
        level = "info",
        skip_all,
        fields(catalog = catalog.len(), max_attempts = policy.max_attempts())
    )]
    pub async fn acquire<R: Rng + ?Sized>(
        &self,
        catalog: &SourceCatalog,
        policy: &BoundedAttempts,
        rng: &mut R,
    ) -> Acquisition {
        let fetcher = &self.fetcher;
        let outcome = policy
            .first_success(catalog.uris(), rng, |uri| async move {
                let entries = load_entries(fetcher, uri).await?;
                latest_item(uri, entries)
            })
            .await;

        let attempts = outcome.attempts();
        match outcome {
            Outcome::Found {
                candidate,
                value,
                failures,
            } => {
                info!(source = %candidate, title = %value.title, attempts, "Found article");
                Acquisition {
                    item: Some(value),
                    failures: to_attempts(failures),
                    attempts,
                }
            }
            Outcome::Exhausted { failures } => {
                error!(attempts, "Could not retrieve an article from any of the tried feeds");
                Acquisition {
                    item: None,
                    failures: to_attempts(failures),
                    attempts,
                }
            }
        }
    }
}

/// Turn the first entry of a feed into a [`RetrievedItem`].
///
/// Only the first entry is considered; if it lacks a title or link the
/// whole candidate fails rather than falling back to a later entry.
pub fn latest_item(source: &str, entries: Vec<FeedEntry>) -> Result<RetrievedItem, SourceError> {
    let first = entries.into_iter().next().ok_or(SourceError::Empty)?;

    let title = first
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SourceError::Parse("latest entry has no title".to_string()))?;
    let link = first
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or_else(|| SourceError::Parse("latest entry has no link".to_string()))?;
    let summary = first.summary.as_deref().map(plain_summary).unwrap_or_default();

    Ok(RetrievedItem {
        title,
        link,
        summary,
        source: source.to_string(),
    })
}

fn to_attempts(failures: Vec<AttemptFailure<'_, String, SourceError>>) -> Vec<SourceAttempt> {
    failures
        .into_iter()
        .map(|f| SourceAttempt {
            source: f.candidate.clone(),
            error: f.error.to_string(),
        })
        .collect()
}
