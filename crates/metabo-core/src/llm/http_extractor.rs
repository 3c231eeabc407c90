//! HTTP-based evidence extractor using external LLM service

use super::response::parse_extraction;
use super::{ChatMessage, ChatOptions, EvidenceExtractor, LLMClient};
use crate::error::Result;
use crate::literature::CandidateDocument;
use crate::research::Extraction;
use async_trait::async_trait;
use std::sync::Arc;

/// Evidence extractor using external HTTP LLM service
pub struct HttpEvidenceExtractor {
    client: Arc<dyn LLMClient>,
    system_prompt: Arc<str>,
}

impl HttpEvidenceExtractor {
    /// Create from LLM client and the extractor system prompt
    pub fn new(client: Arc<dyn LLMClient>, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl EvidenceExtractor for HttpEvidenceExtractor {
    async fn extract(
        &self,
        query: &str,
        document: &CandidateDocument,
        full_text: Option<&str>,
    ) -> Result<Extraction> {
        let messages = vec![
            ChatMessage::system(&*self.system_prompt),
            ChatMessage::user(build_extraction_prompt(query, document, full_text)),
        ];

        let response = self
            .client
            .chat_completion(messages, &ChatOptions::deterministic(768))
            .await?;

        parse_extraction(&response)
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

fn build_extraction_prompt(
    query: &str,
    document: &CandidateDocument,
    full_text: Option<&str>,
) -> String {
    let paper = match full_text {
        Some(body) => format!(
            "# {}\n\n### Abstract\n\n{}\n\n{}",
            document.title, document.abstract_text, body
        ),
        None => format!("# {}\n\n### Abstract\n\n{}", document.title, document.abstract_text),
    };

    format!(
        "Extract the relevant information from the following paper for the query: '{}'\n\n{}\n\n",
        query, paper
    )
}
