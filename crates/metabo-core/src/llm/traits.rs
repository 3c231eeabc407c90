//! LLM trait definitions
//!
//! Each judgment-producing stage talks to its reasoning backend through one of
//! these capabilities, so tests can substitute deterministic stubs.

use crate::error::Result;
use crate::literature::CandidateDocument;
use crate::research::{Extraction, QueryFocus, RelevanceVerdict};
use async_trait::async_trait;

/// Query reformulation trait
#[async_trait]
pub trait QueryReformulator: Send + Sync {
    /// Produce up to `count` alternative phrasings of `query`
    async fn reformulate(&self, query: &str, count: usize) -> Result<Reformulation>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Raw reformulator output, before sanitizing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reformulation {
    /// Entities the backend identified in the question
    pub focus: Option<QueryFocus>,
    /// Alternative phrasings, in backend order
    pub variants: Vec<String>,
}

/// Per-document relevance judgment trait
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Judge title and abstract of `document` against `query`
    async fn judge(&self, query: &str, document: &CandidateDocument) -> Result<RelevanceVerdict>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Per-document evidence extraction trait
#[async_trait]
pub trait EvidenceExtractor: Send + Sync {
    /// Synthesize what `document` says about `query`, or return the empty sentinel
    async fn extract(
        &self,
        query: &str,
        document: &CandidateDocument,
        full_text: Option<&str>,
    ) -> Result<Extraction>;

    /// Get model name
    fn model_name(&self) -> &str;
}
