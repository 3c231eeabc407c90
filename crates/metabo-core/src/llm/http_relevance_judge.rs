//! HTTP-based relevance judge using external LLM service

use super::response::parse_verdict;
use super::{ChatMessage, ChatOptions, LLMClient, RelevanceJudge};
use crate::error::Result;
use crate::literature::CandidateDocument;
use crate::research::RelevanceVerdict;
use async_trait::async_trait;
use std::sync::Arc;

/// Relevance judge using external HTTP LLM service
pub struct HttpRelevanceJudge {
    client: Arc<dyn LLMClient>,
    system_prompt: Arc<str>,
}

impl HttpRelevanceJudge {
    /// Create from LLM client and the evaluator system prompt
    pub fn new(client: Arc<dyn LLMClient>, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl RelevanceJudge for HttpRelevanceJudge {
    async fn judge(&self, query: &str, document: &CandidateDocument) -> Result<RelevanceVerdict> {
        let messages = vec![
            ChatMessage::system(&*self.system_prompt),
            ChatMessage::user(build_judge_prompt(query, document)),
        ];

        let response = self
            .client
            .chat_completion(messages, &ChatOptions::structured(32))
            .await?;

        parse_verdict(&response)
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

/// Title and abstract only; full text is the extractor's concern
fn build_judge_prompt(query: &str, document: &CandidateDocument) -> String {
    format!(
        "Is the following paper relevant to the query: '{}'\n\n# {}\n\n{}\n\n\
         Please answer with JSON: {{\"relevant\": \"yes\"}} or {{\"relevant\": \"no\"}}.",
        query, document.title, document.abstract_text
    )
}
