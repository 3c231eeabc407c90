//! Output formatters

pub mod json;
pub mod markdown;
pub mod terminal;

use crate::app::OutputFormat;
use metabo_core::{CandidateDocument, SynthesizedAnswer};

/// Format a synthesized answer
pub fn format_answer(answer: &SynthesizedAnswer, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::format_answer(answer),
        OutputFormat::Md => markdown::format_answer(answer),
        OutputFormat::Cli => terminal::format_answer(answer),
    }
}

/// Format a literature search listing
pub fn format_documents(
    documents: &[CandidateDocument],
    query: &str,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => json::format_documents(documents),
        OutputFormat::Md => markdown::format_documents(documents, query),
        OutputFormat::Cli => terminal::format_documents(documents),
    }
}
