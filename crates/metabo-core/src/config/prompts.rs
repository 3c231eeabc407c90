//! System prompts sent to the reasoning backend
//!
//! Built-in prompts are compiled into the binary. A prompt directory may
//! override any of them; the set is loaded once and then shared read-only.

use crate::error::Result;
use std::path::Path;

const REFORMULATOR_FILE: &str = "reformulator_sys.md";
const EVALUATOR_FILE: &str = "evaluator_sys.md";
const EXTRACTOR_FILE: &str = "extractor_sys.md";

/// Immutable prompt templates, one per judgment-producing stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub reformulator: String,
    pub evaluator: String,
    pub extractor: String,
}

impl PromptSet {
    /// Prompts shipped with the crate
    pub fn builtin() -> Self {
        Self {
            reformulator: include_str!("../../prompts/reformulator_sys.md").to_string(),
            evaluator: include_str!("../../prompts/evaluator_sys.md").to_string(),
            extractor: include_str!("../../prompts/extractor_sys.md").to_string(),
        }
    }

    /// Built-ins, overridden file-by-file from `dir` when given
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut prompts = Self::builtin();
        let Some(dir) = dir else {
            return Ok(prompts);
        };

        if let Some(text) = read_override(dir, REFORMULATOR_FILE)? {
            prompts.reformulator = text;
        }
        if let Some(text) = read_override(dir, EVALUATOR_FILE)? {
            prompts.evaluator = text;
        }
        if let Some(text) = read_override(dir, EXTRACTOR_FILE)? {
            prompts.extractor = text;
        }
        Ok(prompts)
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn read_override(dir: &Path, file: &str) -> Result<Option<String>> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    if text.trim().is_empty() {
        tracing::warn!("Ignoring empty prompt override {}", path.display());
        return Ok(None);
    }
    tracing::debug!("Using prompt override {}", path.display());
    Ok(Some(text))
}
