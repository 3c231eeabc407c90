//! Markdown output formatter

use metabo_core::{CandidateDocument, SynthesizedAnswer};

pub fn format_answer(answer: &SynthesizedAnswer) -> String {
    let mut output = format!("# {}\n\n", answer.query);

    if let Some(ref focus) = answer.focus {
        output.push_str(&format!(
            "- **Metabolite**: {}\n- **Condition**: {}\n\n",
            focus.metabolite(),
            focus.condition()
        ));
    }

    if answer.is_no_evidence() {
        output.push_str(&format!("*{}*\n", answer.text));
        return output;
    }

    for entry in &answer.entries {
        output.push_str(&format!("## {}\n\n", entry.title));
        let mut source = format!(
            "PMID [{id}](https://pubmed.ncbi.nlm.nih.gov/{id}/)",
            id = entry.document_id
        );
        if let Some(ref journal) = entry.journal {
            source.push_str(&format!(", {}", journal));
        }
        if let Some(ref year) = entry.year {
            source.push_str(&format!(" ({})", year));
        }
        output.push_str(&format!("*{}*\n\n", source));
        output.push_str(&entry.synthesis);
        output.push_str("\n\n---\n\n");
    }

    output
}

pub fn format_documents(documents: &[CandidateDocument], query: &str) -> String {
    let mut output = format!("# Literature: {}\n\n", query);

    for (i, d) in documents.iter().enumerate() {
        output.push_str(&format!("## {}. {}\n\n", i + 1, d.title));
        output.push_str(&format!("- **PMID**: `{}`\n", d.id));
        if let Some(ref authors) = d.authors {
            output.push_str(&format!("- **Authors**: {}\n", authors));
        }
        if let Some(ref year) = d.year {
            output.push_str(&format!("- **Year**: {}\n", year));
        }
        output.push_str("\n---\n\n");
    }

    if documents.is_empty() {
        output.push_str("*No results found*\n");
    }

    output
}
