//! Literature research pipeline
//!
//! reformulate -> search -> filter -> extract -> aggregate
//!
//! Each stage owns its output until it hands it to the next one. Only the
//! filter and extract stages fan out, one task per candidate document.

mod aggregator;
mod pipeline;
mod stages;

pub use aggregator::aggregate;
pub use pipeline::{PipelineBuilder, ResearchPipeline};

use crate::error::{MetaboError, Result};
use crate::llm::response::collapse_whitespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Answer text when no document yielded usable evidence
pub const NO_EVIDENCE_TEXT: &str =
    "No evidence found: none of the retrieved publications addresses both the metabolite and the condition.";

/// The metabolite and health condition a question is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFocus {
    metabolite: String,
    condition: String,
}

impl QueryFocus {
    /// Both names must be non-blank
    pub fn new(metabolite: impl AsRef<str>, condition: impl AsRef<str>) -> Option<Self> {
        let metabolite = collapse_whitespace(metabolite.as_ref());
        let condition = collapse_whitespace(condition.as_ref());
        if metabolite.is_empty() || condition.is_empty() {
            return None;
        }
        Some(Self {
            metabolite,
            condition,
        })
    }

    pub fn metabolite(&self) -> &str {
        &self.metabolite
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Whether `text` names both the metabolite and the condition
    ///
    /// Plain substring match after normalisation: synonyms and salt forms
    /// ("propionate" for "propionic acid") do not count.
    pub fn is_addressed_by(&self, text: &str) -> bool {
        let haystack = normalize_term(text);
        haystack.contains(&normalize_term(&self.metabolite))
            && haystack.contains(&normalize_term(&self.condition))
    }

    /// Whether `text` names at least one of the two entities
    pub fn touches(&self, text: &str) -> bool {
        let haystack = normalize_term(text);
        haystack.contains(&normalize_term(&self.metabolite))
            || haystack.contains(&normalize_term(&self.condition))
    }
}

/// Case, hyphenation and spacing differences do not count
fn normalize_term(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase().replace(['-', '_'], " "))
}

/// A research question as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchQuery {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<QueryFocus>,
}

impl ResearchQuery {
    /// Blank questions are rejected
    pub fn new(text: impl AsRef<str>) -> Result<Self> {
        let text = collapse_whitespace(text.as_ref());
        if text.is_empty() {
            return Err(MetaboError::InvalidInput(
                "research question must not be empty".to_string(),
            ));
        }
        Ok(Self { text, focus: None })
    }

    /// Pin the metabolite and condition instead of letting the reformulator infer them
    pub fn with_focus(mut self, focus: QueryFocus) -> Self {
        self.focus = Some(focus);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn focus(&self) -> Option<&QueryFocus> {
        self.focus.as_ref()
    }
}

/// One phrasing sent to the search adapter
#[derive(Debug, Clone)]
pub struct ReformulatedQuery {
    text: String,
    origin: Arc<ResearchQuery>,
    index: usize,
}

impl ReformulatedQuery {
    pub(crate) fn new(text: String, origin: Arc<ResearchQuery>, index: usize) -> Self {
        Self {
            text,
            origin,
            index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The question this phrasing was derived from
    pub fn origin(&self) -> &ResearchQuery {
        &self.origin
    }

    /// Position in the reformulation list; 0 is the question itself
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_original(&self) -> bool {
        self.index == 0
    }
}

/// Binary relevance judgment for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceVerdict {
    Relevant,
    NotRelevant,
}

impl RelevanceVerdict {
    pub fn is_relevant(self) -> bool {
        matches!(self, Self::Relevant)
    }
}

/// Extractor output for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Extraction {
    /// Passed the filter but yielded no usable evidence
    Empty,
    /// One or two paragraphs of prose
    Synthesis(String),
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Synthesis(text) => Some(text),
        }
    }
}

/// One cited document in the final answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerEntry {
    pub document_id: String,
    pub title: String,
    pub synthesis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
}

impl AnswerEntry {
    /// Citation block: `[id] title`, blank line, synthesis
    pub fn render(&self) -> String {
        format!("[{}] {}\n\n{}", self.document_id, self.title, self.synthesis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Evidence,
    NoEvidence,
}

/// Counters collected while a question is answered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub reformulations: usize,
    pub failed_searches: usize,
    pub candidates: usize,
    pub unique_documents: usize,
    pub relevant: usize,
    pub judgment_failures: usize,
    pub extraction_failures: usize,
    pub empty_extractions: usize,
    pub cited: usize,
}

/// Final result handed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedAnswer {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<QueryFocus>,
    pub reformulations: Vec<String>,
    pub entries: Vec<AnswerEntry>,
    pub text: String,
    pub outcome: AnswerOutcome,
    pub stats: PipelineStats,
    pub generated_at: DateTime<Utc>,
}

impl SynthesizedAnswer {
    pub fn is_no_evidence(&self) -> bool {
        self.outcome == AnswerOutcome::NoEvidence
    }

    /// Cited document identifiers in answer order
    pub fn citations(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.document_id.as_str()).collect()
    }
}
