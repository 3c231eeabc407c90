//! Validation of backend output against the shapes each exchange allows

use crate::error::{MetaboError, Result};
use crate::research::{Extraction, RelevanceVerdict};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// Literal token the extractor emits for "nothing usable in this paper"
pub const EXTRACTION_SENTINEL: &str = "NOT_RELEVANT";

/// Extractions are at most this many paragraphs
pub const MAX_PARAGRAPHS: usize = 2;

/// A paragraph longer than this is not the bounded prose we asked for
pub const MAX_PARAGRAPH_CHARS: usize = 2_000;

lazy_static! {
    static ref LIST_MARKER_RE: Regex = Regex::new(r"^\s*(?:[-*•]+|\d+[.)]|\(\d+\))\s+").unwrap();
    static ref META_PREFIX_RE: Regex = Regex::new(
        r"(?i)^\s*(?:reformulated|rephrased|rewritten|alternative|revised)?\s*(?:query|question|phrasing|version)\s*\d*\s*:\s*"
    )
    .unwrap();
    static ref MARKDOWN_LINE_RE: Regex =
        Regex::new(r"^\s*(?:#{1,6}\s|[-*+•]\s|\d+[.)]\s|```|>\s|\|)").unwrap();
    static ref EMPHASIS_RE: Regex = Regex::new(r"\*\*[^*]+\*\*|__[^_]+__").unwrap();
    static ref PARAGRAPH_BREAK_RE: Regex = Regex::new(r"\n\s*\n").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Slice out the outermost `{...}` (handles markdown code fences and chatter)
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// Parse exactly `{"relevant": "yes" | "no"}`; anything else is a protocol violation
///
/// Surrounding whitespace and a single markdown code fence are tolerated.
/// Prose around the object, extra keys, booleans and any other spelling of
/// the answer are not.
pub fn parse_verdict(response: &str) -> Result<RelevanceVerdict> {
    let json = strip_code_fence(response);

    let value: Value = serde_json::from_str(json).map_err(|e| {
        MetaboError::MalformedJudgment(format!(
            "verdict is not a bare JSON object ({}): {:?}",
            e,
            preview(response)
        ))
    })?;

    let Value::Object(fields) = value else {
        return Err(MetaboError::MalformedJudgment(format!(
            "verdict is not a JSON object: {:?}",
            preview(response)
        )));
    };

    if let Some(extra) = fields.keys().find(|key| key.as_str() != "relevant") {
        return Err(MetaboError::MalformedJudgment(format!(
            "verdict has unexpected field {:?}",
            extra
        )));
    }

    match fields.get("relevant") {
        Some(Value::String(answer)) => match answer.as_str() {
            "yes" => Ok(RelevanceVerdict::Relevant),
            "no" => Ok(RelevanceVerdict::NotRelevant),
            other => Err(MetaboError::MalformedJudgment(format!(
                "verdict must be \"yes\" or \"no\", got {:?}",
                other
            ))),
        },
        Some(other) => Err(MetaboError::MalformedJudgment(format!(
            "verdict has unexpected type: {}",
            other
        ))),
        None => Err(MetaboError::MalformedJudgment(
            "verdict is missing the \"relevant\" field".to_string(),
        )),
    }
}

/// Body of a fenced block (```` ```json ... ``` ````), else the trimmed input
fn strip_code_fence(response: &str) -> &str {
    let text = response.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line
    match body.split_once('\n') {
        Some((info, inner)) if !info.trim_start().starts_with('{') => inner.trim(),
        _ => body.trim(),
    }
}

/// Validate extractor prose or recognise the sentinel
pub fn parse_extraction(response: &str) -> Result<Extraction> {
    let text = response.trim();
    if text.is_empty() || is_sentinel(text) {
        return Ok(Extraction::Empty);
    }

    if text.contains(EXTRACTION_SENTINEL) {
        return Err(MetaboError::MalformedJudgment(
            "extraction mixes the sentinel with prose".to_string(),
        ));
    }

    if let Some(line) = text.lines().find(|line| MARKDOWN_LINE_RE.is_match(line)) {
        return Err(MetaboError::MalformedJudgment(format!(
            "extraction contains structural formatting: {:?}",
            preview(line)
        )));
    }

    if EMPHASIS_RE.is_match(text) {
        return Err(MetaboError::MalformedJudgment(
            "extraction contains emphasis markup".to_string(),
        ));
    }

    let paragraphs: Vec<String> = PARAGRAPH_BREAK_RE
        .split(text)
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.len() > MAX_PARAGRAPHS {
        return Err(MetaboError::MalformedJudgment(format!(
            "extraction has {} paragraphs, at most {} allowed",
            paragraphs.len(),
            MAX_PARAGRAPHS
        )));
    }

    if paragraphs
        .iter()
        .any(|p| p.chars().count() > MAX_PARAGRAPH_CHARS)
    {
        return Err(MetaboError::MalformedJudgment(
            "extraction paragraph exceeds the length bound".to_string(),
        ));
    }

    Ok(Extraction::Synthesis(paragraphs.join("\n\n")))
}

fn is_sentinel(text: &str) -> bool {
    let stripped = text.trim_matches(|c: char| c.is_ascii_punctuation() && c != '_' || c.is_whitespace());
    stripped.eq_ignore_ascii_case(EXTRACTION_SENTINEL)
}

/// Strip list markers, meta prefixes and quotes from one reformulation
pub fn clean_reformulation(raw: &str) -> Option<String> {
    let text = LIST_MARKER_RE.replace(raw.trim(), "");
    let text = META_PREFIX_RE.replace(&text, "");
    let text = text.trim().trim_matches(|c: char| matches!(c,'"' | '\'' | '`' | '“' | '”'));
    let text = collapse_whitespace(text);

    if text.is_empty() || text.ends_with(':') {
        return None;
    }
    Some(text)
}

/// Comparison key under which two phrasings count as the same
pub fn comparison_key(text: &str) -> String {
    collapse_whitespace(text)
        .to_lowercase()
        .trim_end_matches(|c: char| matches!(c, '?' | '.' | '!') || c.is_whitespace())
        .to_string()
}

/// Collapse runs of whitespace to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn preview(text: &str) -> &str {
    truncate_chars(text, 120)
}
