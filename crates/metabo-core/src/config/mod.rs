//! Configuration management

mod prompts;

pub use prompts::PromptSet;

use crate::error::{MetaboError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on reformulations per query; caps downstream fan-out
pub const MAX_REFORMULATIONS: usize = 8;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LLMServiceConfig,

    /// Literature search backend
    #[serde(default)]
    pub literature: LiteratureConfig,

    /// Pipeline limits and timeouts
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Directory holding prompt overrides
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Base URL of an OpenAI-compatible chat completions service
    #[serde(default = "default_llm_url")]
    pub url: String,

    /// Model name for chat completions
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            model: default_chat_model(),
            api_key: std::env::var("METABO_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_llm_url() -> String {
    std::env::var("METABO_LLM_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn default_chat_model() -> String {
    std::env::var("METABO_LLM_MODEL")
        .unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string())
}

fn default_timeout() -> u64 {
    30
}

/// Literature search backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureConfig {
    /// Europe PMC REST base URL
    #[serde(default = "default_literature_url")]
    pub base_url: String,

    /// Restrict results to one Europe PMC source (MED = PubMed)
    #[serde(default = "default_source_filter")]
    pub source_filter: Option<String>,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Contact address sent with requests
    #[serde(default)]
    pub email: Option<String>,

    /// Fetch open-access full text for documents that pass the filter
    #[serde(default = "default_true")]
    pub fetch_full_text: bool,
}

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            base_url: default_literature_url(),
            source_filter: default_source_filter(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
            email: std::env::var("METABO_CONTACT_EMAIL").ok(),
            fetch_full_text: true,
        }
    }
}

fn default_literature_url() -> String {
    std::env::var("METABO_LITERATURE_URL")
        .unwrap_or_else(|_| "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string())
}

fn default_source_filter() -> Option<String> {
    Some("MED".to_string())
}

fn default_page_size() -> usize {
    25
}

fn default_true() -> bool {
    true
}

/// Limits, fan-out and timeouts for the research pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Total queries searched, original included
    #[serde(default = "default_max_reformulations")]
    pub max_reformulations: usize,

    /// Candidate documents taken from each query's result stream
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_query: usize,

    /// Concurrent judgment/extraction calls in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Budget for a single relevance or extraction call
    #[serde(default = "default_timeout")]
    pub judgment_timeout_secs: u64,

    /// Budget for collecting one query's candidates
    #[serde(default = "default_timeout")]
    pub search_timeout_secs: u64,

    /// Full text beyond this many characters is dropped before extraction
    #[serde(default = "default_max_full_text_chars")]
    pub max_full_text_chars: usize,

    /// Require both focus terms to appear in a document before consulting the backend
    #[serde(default = "default_true")]
    pub require_focus_terms: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_reformulations: default_max_reformulations(),
            max_candidates_per_query: default_max_candidates(),
            max_concurrency: default_max_concurrency(),
            judgment_timeout_secs: default_timeout(),
            search_timeout_secs: default_timeout(),
            max_full_text_chars: default_max_full_text_chars(),
            require_focus_terms: true,
        }
    }
}

fn default_max_reformulations() -> usize {
    3
}

fn default_max_candidates() -> usize {
    10
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_full_text_chars() -> usize {
    12_000
}

impl PipelineConfig {
    /// Reject values that would make the pipeline unbounded or inert
    pub fn validate(&self) -> Result<()> {
        if self.max_reformulations == 0 {
            return Err(MetaboError::Config(
                "pipeline.max_reformulations must be at least 1".to_string(),
            ));
        }
        if self.max_reformulations > MAX_REFORMULATIONS {
            return Err(MetaboError::Config(format!(
                "pipeline.max_reformulations must not exceed {} (got {})",
                MAX_REFORMULATIONS, self.max_reformulations
            )));
        }
        if self.max_candidates_per_query == 0 {
            return Err(MetaboError::Config(
                "pipeline.max_candidates_per_query must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(MetaboError::Config(
                "pipeline.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.judgment_timeout_secs == 0 || self.search_timeout_secs == 0 {
            return Err(MetaboError::Config(
                "pipeline timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load config from `$METABO_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::resolve_path())
    }

    /// Load config from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config path honouring `$METABO_CONFIG`
    pub fn resolve_path() -> PathBuf {
        std::env::var(crate::CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.literature.page_size == 0 {
            return Err(MetaboError::Config(
                "literature.page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the prompt set this configuration points at
    pub fn prompts(&self) -> Result<PromptSet> {
        PromptSet::load(self.prompts_dir.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_pipeline_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_reformulations_rejected() {
        let config = PipelineConfig {
            max_reformulations: 0,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("max_reformulations"));
    }

    #[test]
    fn test_reformulation_ceiling_enforced() {
        let config = PipelineConfig {
            max_reformulations: MAX_REFORMULATIONS + 1,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = PipelineConfig {
            judgment_timeout_secs: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "pipeline:\n  max_reformulations: 5\n  require_focus_terms: false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pipeline.max_reformulations, 5);
        assert!(!config.pipeline.require_focus_terms);
        assert_eq!(config.pipeline.max_concurrency, 4);
        assert_eq!(config.literature.page_size, 25);
        assert_eq!(config.literature.source_filter.as_deref(), Some("MED"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(config.pipeline.max_candidates_per_query, 10);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yml");
        let mut config = Config::default();
        config.pipeline.max_concurrency = 2;
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.pipeline.max_concurrency, 2);
    }
}
