//! LLM integration
//!
//! Provides traits and implementations for:
//! - Chat completions via external services (vLLM, OpenAI, etc.)
//! - Query reformulation
//! - Relevance judgment
//! - Evidence extraction

mod cache;
mod client;
mod http_extractor;
mod http_reformulator;
mod http_relevance_judge;
pub mod response;
mod traits;

pub use cache::{CacheStats, LLMCache};
pub use client::{APIMetrics, ChatMessage, ChatOptions, LLMClient, MetricsSnapshot, VLLMClient};
pub use http_extractor::HttpEvidenceExtractor;
pub use http_reformulator::HttpQueryReformulator;
pub use http_relevance_judge::HttpRelevanceJudge;
pub use traits::*;
