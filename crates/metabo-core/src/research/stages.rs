//! Pipeline stages
//!
//! Every per-document call runs under its own timeout. A timeout or error
//! settles that document to the conservative default and never aborts the
//! batch.

use super::{
    Extraction, PipelineStats, QueryFocus, ReformulatedQuery, RelevanceVerdict, ResearchQuery,
};
use crate::literature::{CandidateDocument, FullTextSource, SearchAdapter};
use crate::llm::response::{clean_reformulation, comparison_key, truncate_chars};
use crate::llm::{EvidenceExtractor, QueryReformulator, RelevanceJudge};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Expands the question into at most `max_queries` distinct phrasings
pub(crate) struct ReformulateStage {
    pub reformulator: Option<Arc<dyn QueryReformulator>>,
    pub max_queries: usize,
    pub timeout: Duration,
}

impl ReformulateStage {
    /// The question itself always comes first
    pub async fn run(
        &self,
        query: &Arc<ResearchQuery>,
    ) -> (Option<QueryFocus>, Vec<ReformulatedQuery>) {
        let mut queries = vec![ReformulatedQuery::new(
            query.text().to_string(),
            Arc::clone(query),
            0,
        )];

        let wanted = self.max_queries.saturating_sub(1);
        let reformulation = match (&self.reformulator, wanted) {
            (Some(reformulator), n) if n > 0 => {
                match timeout(self.timeout, reformulator.reformulate(query.text(), n)).await {
                    Ok(Ok(reformulation)) => Some(reformulation),
                    Ok(Err(e)) => {
                        tracing::warn!("Reformulation failed, searching with the question only: {}", e);
                        None
                    }
                    Err(_) => {
                        tracing::warn!("Reformulation timed out, searching with the question only");
                        None
                    }
                }
            }
            _ => None,
        };

        let (inferred_focus, variants) = match reformulation {
            Some(r) => (r.focus, r.variants),
            None => (None, Vec::new()),
        };
        let focus = query.focus().cloned().or(inferred_focus);

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(comparison_key(query.text()));

        for raw in variants {
            if queries.len() >= self.max_queries {
                break;
            }
            let Some(text) = clean_reformulation(&raw) else {
                continue;
            };
            if let Some(ref focus) = focus {
                if !focus.touches(&text) {
                    tracing::debug!(variant = %text, "Dropping reformulation that lost both entities");
                    continue;
                }
            }
            if !seen.insert(comparison_key(&text)) {
                continue;
            }
            let index = queries.len();
            queries.push(ReformulatedQuery::new(text, Arc::clone(query), index));
        }

        (focus, queries)
    }
}

/// Runs every phrasing against the search adapter and merges the hits
pub(crate) struct SearchStage {
    pub adapter: Arc<dyn SearchAdapter>,
    pub max_candidates: usize,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl SearchStage {
    /// Hits in first-seen order, unique by document id
    pub async fn run(
        &self,
        queries: &[ReformulatedQuery],
        stats: &mut PipelineStats,
    ) -> Vec<CandidateDocument> {
        let batches: Vec<Option<Vec<CandidateDocument>>> = stream::iter(queries)
            .map(|query| self.collect(query))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for batch in batches {
            let Some(batch) = batch else {
                stats.failed_searches += 1;
                continue;
            };
            stats.candidates += batch.len();
            for document in batch {
                if seen.insert(document.id.clone()) {
                    documents.push(document);
                }
            }
        }
        stats.unique_documents = documents.len();
        documents
    }

    /// `None` when the search failed; its hits are discarded entirely
    async fn collect(&self, query: &ReformulatedQuery) -> Option<Vec<CandidateDocument>> {
        let hits = self
            .adapter
            .search(query.text())
            .take(self.max_candidates)
            .try_collect::<Vec<_>>();

        match timeout(self.timeout, hits).await {
            Ok(Ok(hits)) => {
                tracing::debug!(
                    adapter = self.adapter.name(),
                    query = query.text(),
                    hits = hits.len(),
                    "Search finished"
                );
                Some(hits)
            }
            Ok(Err(e)) => {
                tracing::warn!(query = query.text(), "Search failed, skipping phrasing: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(query = query.text(), "Search timed out, skipping phrasing");
                None
            }
        }
    }
}

/// How a per-document call ended
enum Settled<T> {
    Done(T),
    Gated,
    Failed,
    TimedOut,
}

/// First gate: title and abstract against the question
pub(crate) struct FilterStage {
    pub judge: Arc<dyn RelevanceJudge>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub require_focus_terms: bool,
}

impl FilterStage {
    /// Relevant documents in input order; each document is judged exactly once
    pub async fn run(
        &self,
        query: &ResearchQuery,
        focus: Option<&QueryFocus>,
        documents: Vec<CandidateDocument>,
        stats: &mut PipelineStats,
    ) -> Vec<CandidateDocument> {
        let mut judged: Vec<(usize, CandidateDocument, Settled<RelevanceVerdict>)> =
            stream::iter(documents.into_iter().enumerate())
                .map(|(index, document)| async move {
                    let settled = self.judge_one(query, focus, &document).await;
                    (index, document, settled)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        judged.sort_by_key(|(index, _, _)| *index);

        let mut relevant = Vec::new();
        for (_, document, settled) in judged {
            let verdict = match settled {
                Settled::Done(verdict) => verdict,
                Settled::Gated => RelevanceVerdict::NotRelevant,
                Settled::Failed | Settled::TimedOut => {
                    stats.judgment_failures += 1;
                    RelevanceVerdict::NotRelevant
                }
            };
            if verdict.is_relevant() {
                relevant.push(document);
            }
        }
        stats.relevant = relevant.len();
        relevant
    }

    async fn judge_one(
        &self,
        query: &ResearchQuery,
        focus: Option<&QueryFocus>,
        document: &CandidateDocument,
    ) -> Settled<RelevanceVerdict> {
        if let Some(focus) = focus.filter(|_| self.require_focus_terms) {
            if !focus.is_addressed_by(&document.summary_text()) {
                tracing::debug!(document = %document.id, "Title and abstract miss an entity, not relevant");
                return Settled::Gated;
            }
        }

        match timeout(self.timeout, self.judge.judge(query.text(), document)).await {
            Ok(Ok(verdict)) => {
                tracing::debug!(document = %document.id, ?verdict, "Judged");
                Settled::Done(verdict)
            }
            Ok(Err(e)) => {
                tracing::warn!(document = %document.id, "Judgment failed, treating as not relevant: {}", e);
                Settled::Failed
            }
            Err(_) => {
                tracing::warn!(document = %document.id, "Judgment timed out, treating as not relevant");
                Settled::TimedOut
            }
        }
    }
}

/// Second gate: bounded prose per relevant document, or the empty sentinel
pub(crate) struct ExtractStage {
    pub extractor: Arc<dyn EvidenceExtractor>,
    pub full_text: Option<Arc<dyn FullTextSource>>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub max_full_text_chars: usize,
    pub require_focus_terms: bool,
}

impl ExtractStage {
    /// One extraction per document, in input order
    pub async fn run(
        &self,
        query: &ResearchQuery,
        focus: Option<&QueryFocus>,
        documents: Vec<CandidateDocument>,
        stats: &mut PipelineStats,
    ) -> Vec<(CandidateDocument, Extraction)> {
        let mut extracted: Vec<(usize, CandidateDocument, Settled<Extraction>)> =
            stream::iter(documents.into_iter().enumerate())
                .map(|(index, document)| async move {
                    let settled = self.extract_one(query, focus, &document).await;
                    (index, document, settled)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        extracted.sort_by_key(|(index, _, _)| *index);

        extracted
            .into_iter()
            .map(|(_, document, settled)| {
                let extraction = match settled {
                    Settled::Done(extraction) => extraction,
                    Settled::Gated => Extraction::Empty,
                    Settled::Failed | Settled::TimedOut => {
                        stats.extraction_failures += 1;
                        Extraction::Empty
                    }
                };
                if extraction.is_empty() {
                    stats.empty_extractions += 1;
                }
                (document, extraction)
            })
            .collect()
    }

    async fn extract_one(
        &self,
        query: &ResearchQuery,
        focus: Option<&QueryFocus>,
        document: &CandidateDocument,
    ) -> Settled<Extraction> {
        let full_text = self.full_text_for(document).await;
        let full_text = full_text
            .as_deref()
            .map(|text| truncate_chars(text, self.max_full_text_chars));

        if let Some(focus) = focus.filter(|_| self.require_focus_terms) {
            let evidence = match full_text {
                Some(body) => format!("{}\n{}", document.summary_text(), body),
                None => document.summary_text(),
            };
            if !focus.is_addressed_by(&evidence) {
                tracing::debug!(document = %document.id, "Source misses an entity, empty extraction");
                return Settled::Gated;
            }
        }

        match timeout(
            self.timeout,
            self.extractor.extract(query.text(), document, full_text),
        )
        .await
        {
            Ok(Ok(extraction)) => Settled::Done(extraction),
            Ok(Err(e)) => {
                tracing::warn!(document = %document.id, "Extraction failed, treating as empty: {}", e);
                Settled::Failed
            }
            Err(_) => {
                tracing::warn!(document = %document.id, "Extraction timed out, treating as empty");
                Settled::TimedOut
            }
        }
    }

    /// Text carried by the document, else the full-text source; failures fall back to the abstract
    async fn full_text_for(&self, document: &CandidateDocument) -> Option<String> {
        if let Some(ref text) = document.full_text {
            return Some(text.clone());
        }
        let source = self.full_text.as_ref()?;

        match timeout(self.timeout, source.fetch_full_text(&document.id)).await {
            Ok(Ok(full_text)) => full_text.into_option(),
            Ok(Err(e)) => {
                tracing::warn!(document = %document.id, "Full text unavailable, using abstract: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(document = %document.id, "Full text fetch timed out, using abstract");
                None
            }
        }
    }
}
