//! HTTP-based query reformulator using external LLM service

use super::{ChatMessage, ChatOptions, LLMClient, QueryReformulator, Reformulation};
use crate::error::Result;
use crate::research::QueryFocus;
use async_trait::async_trait;
use std::sync::Arc;

/// Query reformulator using external HTTP LLM service
pub struct HttpQueryReformulator {
    client: Arc<dyn LLMClient>,
    system_prompt: Arc<str>,
}

impl HttpQueryReformulator {
    /// Create from LLM client and the reformulator system prompt
    pub fn new(client: Arc<dyn LLMClient>, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl QueryReformulator for HttpQueryReformulator {
    async fn reformulate(&self, query: &str, count: usize) -> Result<Reformulation> {
        if count == 0 {
            return Ok(Reformulation::default());
        }

        let messages = vec![
            ChatMessage::system(&*self.system_prompt),
            ChatMessage::user(build_reformulation_prompt(query, count)),
        ];

        // Sampled hot so the phrasings actually differ from each other
        let options = ChatOptions {
            temperature: 1.0,
            max_tokens: 512,
            json_mode: true,
        };

        let response = self.client.chat_completion(messages, &options).await?;

        Ok(parse_reformulation_response(&response))
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

fn build_reformulation_prompt(query: &str, count: usize) -> String {
    format!(
        r#"Research question: "{}"

Write {} alternative phrasings of this question.

Example:

Input: "Is there a link between nicotine and hyperactivity"
Output: {{
  "metabolite": "nicotine",
  "condition": "hyperactivity",
  "reformulations": ["Does nicotine exposure cause hyperactive behaviour?", "Nicotine and hyperlocomotion: is there an association?"]
}}

Output only JSON:"#,
        query, count
    )
}

/// Unparseable output degrades to an empty reformulation
fn parse_reformulation_response(response: &str) -> Reformulation {
    let Some(json_str) = super::response::extract_json_object(response) else {
        tracing::warn!("Reformulator returned no JSON object, using original query only");
        tracing::debug!("Raw LLM response: {}", response);
        return Reformulation::default();
    };

    let parsed: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to parse reformulation JSON: {}, using original query only", e);
            tracing::debug!("Raw LLM response: {}", response);
            return Reformulation::default();
        }
    };

    let variants = parsed["reformulations"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let focus = match (parsed["metabolite"].as_str(), parsed["condition"].as_str()) {
        (Some(metabolite), Some(condition)) => QueryFocus::new(metabolite, condition),
        _ => None,
    };

    Reformulation { focus, variants }
}
