//! Europe PMC REST client
//!
//! Searches PubMed-indexed records through the Europe PMC JSON API and pulls
//! open-access full text where a PMC copy exists.

use super::markup::{body_text_from_xml, inline_text};
use super::{CandidateDocument, DocumentStream, FullText, FullTextSource, SearchAdapter};
use crate::config::LiteratureConfig;
use crate::error::{MetaboError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const INITIAL_CURSOR: &str = "*";

/// Europe PMC search and full-text client
pub struct EuropePmcClient {
    client: Client,
    config: LiteratureConfig,
}

impl EuropePmcClient {
    /// Create a client from the literature section of the configuration
    pub fn new(config: LiteratureConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("metabo-research/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(MetaboError::Http)?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn scoped_query(&self, query: &str) -> String {
        scope_query(query, self.config.source_filter.as_deref())
    }

    async fn get_text(&self, url: &str, params: &[(&str, &str)]) -> Result<Option<String>> {
        let mut request = self.client.get(url).query(params);
        if let Some(ref email) = self.config.email {
            request = request.query(&[("email", email.as_str())]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MetaboError::Timeout(format!("Europe PMC request to {} timed out", url))
            } else if e.is_connect() {
                MetaboError::Search(format!("Cannot reach Europe PMC at {}: {}", url, e))
            } else {
                MetaboError::Search(format!("Europe PMC request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    "Europe PMC rate limit exceeded (429), try again later".to_string()
                }
                s if s.is_server_error() => {
                    format!("Europe PMC server error ({})", s.as_u16())
                }
                s => format!(
                    "Europe PMC HTTP error {}: {}",
                    s.as_u16(),
                    s.canonical_reason().unwrap_or("Unknown error")
                ),
            };
            return Err(MetaboError::Search(message));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MetaboError::Search(format!("Failed to read Europe PMC response: {}", e)))?;
        Ok(Some(body))
    }

    async fn fetch_page(&self, query: &str, cursor: &str) -> Result<SearchPage> {
        let url = format!("{}/search", self.base_url());
        let page_size = self.config.page_size.to_string();
        let params = [
            ("query", query),
            ("format", "json"),
            ("resultType", "core"),
            ("pageSize", page_size.as_str()),
            ("cursorMark", cursor),
        ];

        tracing::debug!(query, cursor, "Fetching Europe PMC page");
        match self.get_text(&url, &params).await? {
            Some(body) => parse_search_page(&body),
            None => Ok(SearchPage::default()),
        }
    }

    /// Fetch a single record by PMID or PMCID
    pub async fn fetch_record(&self, document_id: &str) -> Result<Option<CandidateDocument>> {
        let url = format!("{}/search", self.base_url());
        let query = record_query(document_id);
        let params = [
            ("query", query.as_str()),
            ("format", "json"),
            ("resultType", "core"),
            ("pageSize", "1"),
        ];

        let Some(body) = self.get_text(&url, &params).await? else {
            return Ok(None);
        };
        Ok(parse_search_page(&body)?.documents.into_iter().next())
    }

    async fn resolve_pmcid(&self, document_id: &str) -> Result<Option<String>> {
        if is_pmcid(document_id) {
            return Ok(Some(document_id.to_ascii_uppercase()));
        }
        Ok(self
            .fetch_record(document_id)
            .await?
            .and_then(|record| record.pmcid))
    }
}

impl SearchAdapter for EuropePmcClient {
    fn name(&self) -> &str {
        "europepmc"
    }

    fn search<'a>(&'a self, query: &'a str) -> DocumentStream<'a> {
        let scoped = self.scoped_query(query);

        stream::try_unfold(Some(INITIAL_CURSOR.to_string()), move |cursor| {
            let scoped = scoped.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok::<_, MetaboError>(None);
                };

                let page = self.fetch_page(&scoped, &cursor).await?;
                if page.documents.is_empty() {
                    return Ok(None);
                }

                let next = page.next_cursor.filter(|next| *next != cursor);
                let hits = stream::iter(page.documents.into_iter().map(Ok::<_, MetaboError>));
                Ok(Some((hits, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    fn lookup<'a>(
        &'a self,
        document_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<CandidateDocument>>> {
        self.fetch_record(document_id).boxed()
    }
}

#[async_trait]
impl FullTextSource for EuropePmcClient {
    async fn fetch_full_text(&self, document_id: &str) -> Result<FullText> {
        let Some(pmcid) = self.resolve_pmcid(document_id).await? else {
            tracing::debug!(document_id, "No PMC copy, full text unavailable");
            return Ok(FullText::Unavailable);
        };

        let url = format!("{}/{}/fullTextXML", self.base_url(), pmcid);
        let Some(xml) = self.get_text(&url, &[]).await? else {
            return Ok(FullText::Unavailable);
        };

        Ok(match body_text_from_xml(&xml)? {
            Some(text) => FullText::Available(text),
            None => FullText::Unavailable,
        })
    }
}

#[derive(Debug, Default)]
struct SearchPage {
    documents: Vec<CandidateDocument>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    next_cursor_mark: Option<String>,
    result_list: Option<ResultList>,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<EpmcRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcRecord {
    id: Option<String>,
    source: Option<String>,
    pmid: Option<String>,
    pmcid: Option<String>,
    title: Option<String>,
    author_string: Option<String>,
    pub_year: Option<String>,
    abstract_text: Option<String>,
    journal_title: Option<String>,
    journal_info: Option<JournalInfo>,
}

#[derive(Debug, Deserialize)]
struct JournalInfo {
    journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    title: Option<String>,
}

impl EpmcRecord {
    fn into_document(self) -> Option<CandidateDocument> {
        let id = match (self.pmid, self.id, self.source) {
            (Some(pmid), _, _) => pmid,
            (None, Some(id), Some(source)) => format!("{}:{}", source, id),
            (None, Some(id), None) => id,
            (None, None, _) => return None,
        };

        let title = inline_text(self.title.as_deref()?);
        if title.is_empty() {
            return None;
        }
        let abstract_text = self
            .abstract_text
            .as_deref()
            .map(inline_text)
            .unwrap_or_default();

        let mut document = CandidateDocument::new(id, title, abstract_text);
        document.authors = self.author_string;
        document.year = self.pub_year;
        document.pmcid = self.pmcid;
        document.journal = self
            .journal_info
            .and_then(|info| info.journal)
            .and_then(|journal| journal.title)
            .or(self.journal_title);
        Some(document)
    }
}

fn parse_search_page(body: &str) -> Result<SearchPage> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| MetaboError::Parse(format!("Invalid Europe PMC response: {}", e)))?;

    let documents = response
        .result_list
        .map(|list| {
            list.result
                .into_iter()
                .filter_map(EpmcRecord::into_document)
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchPage {
        documents,
        next_cursor: response.next_cursor_mark,
    })
}

fn scope_query(query: &str, source_filter: Option<&str>) -> String {
    match source_filter {
        Some(source) if !source.trim().is_empty() => {
            format!("({}) AND SRC:{}", query.trim(), source.trim())
        }
        _ => query.trim().to_string(),
    }
}

/// Query matching exactly one record: `PMCID:` for PMC ids, else a MEDLINE id
fn record_query(document_id: &str) -> String {
    let id = document_id.trim();
    if is_pmcid(id) {
        format!("PMCID:{}", id.to_ascii_uppercase())
    } else {
        format!("EXT_ID:{} AND SRC:MED", id)
    }
}

fn is_pmcid(id: &str) -> bool {
    match (id.get(..3), id.get(3..)) {
        (Some(prefix), Some(digits)) => {
            prefix.eq_ignore_ascii_case("PMC")
                && !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}
