//! Literature sources
//!
//! A search adapter turns one query string into a lazy, finite stream of
//! candidate documents. Every call starts its own paging cursor, so two
//! searches never share state. Full text is a separate, optional capability.

mod europe_pmc;
mod markup;

pub use europe_pmc::EuropePmcClient;

use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

/// Lazy sequence of search hits
pub type DocumentStream<'a> = BoxStream<'a, Result<CandidateDocument>>;

/// Bibliographic record returned by a literature search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDocument {
    /// External identifier (PMID where the source has one)
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    /// PubMed Central id, when an open-access copy exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
}

impl CandidateDocument {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            full_text: None,
            authors: None,
            year: None,
            journal: None,
            pmcid: None,
        }
    }

    pub fn with_full_text(mut self, full_text: impl Into<String>) -> Self {
        self.full_text = Some(full_text.into());
        self
    }

    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn with_journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = Some(journal.into());
        self
    }

    pub fn with_pmcid(mut self, pmcid: impl Into<String>) -> Self {
        self.pmcid = Some(pmcid.into());
        self
    }

    /// Title and abstract joined, the evidence the relevance filter sees
    pub fn summary_text(&self) -> String {
        format!("{}\n{}", self.title, self.abstract_text)
    }
}

/// Literature search capability
pub trait SearchAdapter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Start a fresh search; the stream ends when the source is exhausted
    fn search<'a>(&'a self, query: &'a str) -> DocumentStream<'a>;

    /// Fetch one record by id
    ///
    /// The default searches for the id and scans the first
    /// [`LOOKUP_SCAN_LIMIT`] hits for an exact match.
    fn lookup<'a>(
        &'a self,
        document_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<CandidateDocument>>> {
        async move {
            let mut hits = self.search(document_id).take(LOOKUP_SCAN_LIMIT);
            while let Some(hit) = hits.try_next().await? {
                if hit.id == document_id {
                    return Ok(Some(hit));
                }
            }
            Ok(None)
        }
        .boxed()
    }
}

/// Hits the default [`SearchAdapter::lookup`] inspects
pub const LOOKUP_SCAN_LIMIT: usize = 25;

/// Result of a full-text lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullText {
    Available(String),
    Unavailable,
}

impl FullText {
    pub fn into_option(self) -> Option<String> {
        match self {
            Self::Available(text) => Some(text),
            Self::Unavailable => None,
        }
    }
}

/// Optional full-text capability
#[async_trait]
pub trait FullTextSource: Send + Sync {
    /// Fetch the body of a document, or `Unavailable` when the source has none
    async fn fetch_full_text(&self, document_id: &str) -> Result<FullText>;
}

/// Collect at most `limit` hits for one query
pub async fn search_documents(
    adapter: &dyn SearchAdapter,
    query: &str,
    limit: usize,
) -> Result<Vec<CandidateDocument>> {
    adapter.search(query).take(limit).try_collect().await
}
