//! Metabo-research Core Library
//!
//! Literature synthesis for questions linking a metabolite to a health condition.
//!
//! # Features
//! - LLM-powered query reformulation to widen recall
//! - Pluggable literature search (Europe PMC / PubMed records out of the box)
//! - Two independent, conservative relevance gates (filter and extractor)
//! - Bounded fan-out with per-document timeouts and failure isolation
//! - De-duplicating aggregation with source citations

pub mod config;
pub mod error;
pub mod literature;
pub mod llm;
pub mod research;

pub use config::{
    Config, LLMServiceConfig, LiteratureConfig, PipelineConfig, PromptSet, MAX_REFORMULATIONS,
};
pub use error::{Error, MetaboError, Result};
pub use literature::{
    search_documents, CandidateDocument, DocumentStream, EuropePmcClient, FullText, FullTextSource,
    SearchAdapter,
};
pub use llm::{
    ChatMessage, ChatOptions, EvidenceExtractor, HttpEvidenceExtractor, HttpQueryReformulator,
    HttpRelevanceJudge, LLMClient, MetricsSnapshot, QueryReformulator, Reformulation,
    RelevanceJudge, VLLMClient,
};
pub use research::{
    AnswerEntry, AnswerOutcome, Extraction, PipelineBuilder, PipelineStats, QueryFocus,
    ReformulatedQuery, RelevanceVerdict, ResearchPipeline, ResearchQuery, SynthesizedAnswer,
    NO_EVIDENCE_TEXT,
};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "metabo";

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV_VAR: &str = "METABO_CONFIG";
