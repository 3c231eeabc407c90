//! JSON output formatter

use metabo_core::{CandidateDocument, SynthesizedAnswer};

pub fn format_answer(answer: &SynthesizedAnswer) -> String {
    serde_json::to_string_pretty(answer).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

pub fn format_documents(documents: &[CandidateDocument]) -> String {
    let output: Vec<serde_json::Value> = documents
        .iter()
        .map(|d| {
            serde_json::json!({
                "pmid": d.id,
                "title": d.title,
                "authors": d.authors,
                "year": d.year,
                "journal": d.journal,
            })
        })
        .collect();

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "[]".to_string()) + "\n"
}
