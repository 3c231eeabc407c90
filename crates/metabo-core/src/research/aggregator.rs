//! Fan-in: per-document extractions to one cited answer

use super::{AnswerEntry, AnswerOutcome, Extraction, NO_EVIDENCE_TEXT};
use crate::literature::CandidateDocument;
use std::collections::HashMap;

/// Combine extractions into cited entries and the answer text
///
/// Documents are cited once, in the order they were first seen. When a
/// document shows up more than once, its first non-empty extraction wins.
pub fn aggregate<I>(extractions: I) -> (Vec<AnswerEntry>, String, AnswerOutcome)
where
    I: IntoIterator<Item = (CandidateDocument, Extraction)>,
{
    let mut slots: Vec<(CandidateDocument, Option<String>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (document, extraction) in extractions {
        let synthesis = match extraction {
            Extraction::Synthesis(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        };

        match positions.get(&document.id) {
            Some(&slot) => {
                if slots[slot].1.is_none() {
                    slots[slot].1 = synthesis;
                }
            }
            None => {
                positions.insert(document.id.clone(), slots.len());
                slots.push((document, synthesis));
            }
        }
    }

    let entries: Vec<AnswerEntry> = slots
        .into_iter()
        .filter_map(|(document, synthesis)| {
            synthesis.map(|synthesis| AnswerEntry {
                document_id: document.id,
                title: document.title,
                synthesis,
                authors: document.authors,
                year: document.year,
                journal: document.journal,
            })
        })
        .collect();

    if entries.is_empty() {
        return (entries, NO_EVIDENCE_TEXT.to_string(), AnswerOutcome::NoEvidence);
    }

    let text = entries
        .iter()
        .map(AnswerEntry::render)
        .collect::<Vec<_>>()
        .join("\n\n");

    (entries, text, AnswerOutcome::Evidence)
}
