//! Terminal output formatter

use metabo_core::{CandidateDocument, SynthesizedAnswer};

pub fn format_answer(answer: &SynthesizedAnswer) -> String {
    let mut output = format!("{}\n", answer.text);

    if !answer.is_no_evidence() {
        output.push_str(&format!(
            "\n{} source(s) cited from {} candidate(s) across {} phrasing(s)\n",
            answer.stats.cited, answer.stats.unique_documents, answer.stats.reformulations
        ));
    }

    output
}

pub fn format_documents(documents: &[CandidateDocument]) -> String {
    let mut output = String::new();

    for d in documents {
        output.push_str(&format!(
            "{:>10}  {}  {}\n",
            d.id,
            d.year.as_deref().unwrap_or("----"),
            d.title
        ));
        if let Some(ref authors) = d.authors {
            output.push_str(&format!("{:>10}  {}\n", "", authors));
        }
    }

    output
}
