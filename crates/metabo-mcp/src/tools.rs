//! MCP tool definitions and handlers

use crate::protocol::*;
use anyhow::Result;
use metabo_core::{search_documents, FullText, QueryFocus, ResearchPipeline, ResearchQuery};
use serde_json::Value;

/// Default number of records listed by `search_literature`
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Upper bound on `search_literature` results
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Reply of `get_full_text` when no open-access body exists
pub const FULL_TEXT_UNAVAILABLE: &str = "Full text not available";

pub fn answer_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "answer".to_string(),
        description: "Answer a question about a metabolite and a health condition from the \
                      PubMed literature. Returns short syntheses, each citing its source PMID, \
                      or an explicit no-evidence answer."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Research question naming a metabolite and a condition"
                },
                "metabolite": {
                    "type": "string",
                    "description": "Metabolite name (inferred from the question when omitted)"
                },
                "condition": {
                    "type": "string",
                    "description": "Health condition (inferred from the question when omitted)"
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn search_literature_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "search_literature".to_string(),
        description: "List PubMed records matching a query (title, authors, year, PMID) \
                      without synthesizing an answer"
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default: 10)",
                    "default": DEFAULT_SEARCH_LIMIT
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn get_abstract_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "get_abstract".to_string(),
        description: "Get the title, authors, date and abstract of one PubMed record, and whether \
                      its full text is available in PubMed Central"
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "pmid": {
                    "type": "string",
                    "description": "PubMed id of the record"
                }
            },
            "required": ["pmid"]
        }),
    }
}

pub fn get_full_text_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "get_full_text".to_string(),
        description: "Get the full text of an open-access article by PMID or PMCID (PMCID wins \
                      when both are given). Replies 'Full text not available' when there is none."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "pmid": {
                    "type": "string",
                    "description": "PubMed id"
                },
                "pmcid": {
                    "type": "string",
                    "description": "PubMed Central id, e.g. PMC8000001"
                }
            }
        }),
    }
}

pub async fn handle_answer(pipeline: &ResearchPipeline, args: Value) -> Result<ToolResult> {
    let question = args
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing query"))?;

    let mut query = ResearchQuery::new(question)?;

    let metabolite = args.get("metabolite").and_then(|v| v.as_str());
    let condition = args.get("condition").and_then(|v| v.as_str());
    match (metabolite, condition) {
        (Some(metabolite), Some(condition)) => {
            let focus = QueryFocus::new(metabolite, condition).ok_or_else(|| {
                anyhow::anyhow!("metabolite and condition must not be blank")
            })?;
            query = query.with_focus(focus);
        }
        (None, None) => {}
        _ => anyhow::bail!("metabolite and condition must be given together"),
    }

    let answer = pipeline.answer(query).await;
    let structured = serde_json::to_value(&answer)?;

    Ok(ToolResult::text(answer.text, Some(structured)))
}

pub async fn handle_search_literature(
    pipeline: &ResearchPipeline,
    args: Value,
) -> Result<ToolResult> {
    let query = args
        .get("query")
        .and_then(|v| v.as_str())
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing query"))?;

    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|l| l as usize)
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let documents = search_documents(pipeline.search_adapter(), query, limit).await?;

    if documents.is_empty() {
        return Ok(ToolResult::text(
            format!("No records found for \"{}\"", query),
            Some(serde_json::json!({ "results": [] })),
        ));
    }

    let listing: Vec<String> = documents
        .iter()
        .map(|doc| {
            format!(
                "Title: {}\nAuthors: {}\nDate: {}\nPMID: {}",
                doc.title,
                doc.authors.as_deref().unwrap_or("unknown"),
                doc.year.as_deref().unwrap_or("unknown"),
                doc.id
            )
        })
        .collect();

    let summary = format!(
        "Found {} records for \"{}\"\n\n{}",
        documents.len(),
        query,
        listing.join("\n\n")
    );
    let structured = serde_json::json!({ "results": documents });

    Ok(ToolResult::text(summary, Some(structured)))
}

pub async fn handle_get_abstract(
    pipeline: &ResearchPipeline,
    args: Value,
) -> Result<ToolResult> {
    let pmid = string_arg(&args, "pmid").ok_or_else(|| anyhow::anyhow!("Missing pmid"))?;

    let Some(record) = pipeline.search_adapter().lookup(pmid).await? else {
        return Ok(ToolResult::error(format!("No record found for PMID {}", pmid)));
    };

    let abstract_text = if record.abstract_text.is_empty() {
        "No abstract available."
    } else {
        record.abstract_text.as_str()
    };
    let availability = match record.pmcid {
        Some(ref pmcid) => format!("Full text available in PMC ({}).", pmcid),
        None => "No full text in PMC.".to_string(),
    };

    let summary = format!(
        "Title: {}\nAuthors: {}\nDate: {}\nPMID: {}\n\n{}\n\n{}",
        record.title,
        record.authors.as_deref().unwrap_or("unknown"),
        record.year.as_deref().unwrap_or("unknown"),
        record.id,
        abstract_text,
        availability
    );
    let structured = serde_json::to_value(&record)?;

    Ok(ToolResult::text(summary, Some(structured)))
}

pub async fn handle_get_full_text(
    pipeline: &ResearchPipeline,
    args: Value,
) -> Result<ToolResult> {
    let id = string_arg(&args, "pmcid")
        .or_else(|| string_arg(&args, "pmid"))
        .ok_or_else(|| anyhow::anyhow!("Provide a pmid or a pmcid"))?;

    let source = pipeline
        .full_text_source()
        .ok_or_else(|| anyhow::anyhow!("Full-text retrieval is disabled in the configuration"))?;

    Ok(match source.fetch_full_text(id).await? {
        FullText::Available(text) => ToolResult::text(text, None),
        FullText::Unavailable => ToolResult::text(FULL_TEXT_UNAVAILABLE.to_string(), None),
    })
}

/// Non-blank string argument
fn string_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
