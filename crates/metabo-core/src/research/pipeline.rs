//! Research pipeline assembly and the `answer` entry point

use super::aggregator::aggregate;
use super::stages::{ExtractStage, FilterStage, ReformulateStage, SearchStage};
use super::{PipelineStats, ResearchQuery, SynthesizedAnswer};
use crate::config::{Config, PipelineConfig, PromptSet};
use crate::error::{MetaboError, Result};
use crate::literature::{EuropePmcClient, FullTextSource, SearchAdapter};
use crate::llm::{
    EvidenceExtractor, HttpEvidenceExtractor, HttpQueryReformulator, HttpRelevanceJudge,
    LLMClient, MetricsSnapshot, QueryReformulator, RelevanceJudge, VLLMClient,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configured reformulate -> search -> filter -> extract -> aggregate pipeline
pub struct ResearchPipeline {
    reformulate: ReformulateStage,
    search: SearchStage,
    filter: FilterStage,
    extract: ExtractStage,
    llm: Option<Arc<VLLMClient>>,
}

/// Collects the capabilities a pipeline needs
pub struct PipelineBuilder {
    config: PipelineConfig,
    reformulator: Option<Arc<dyn QueryReformulator>>,
    judge: Option<Arc<dyn RelevanceJudge>>,
    extractor: Option<Arc<dyn EvidenceExtractor>>,
    search: Option<Arc<dyn SearchAdapter>>,
    full_text: Option<Arc<dyn FullTextSource>>,
    llm: Option<Arc<VLLMClient>>,
}

impl PipelineBuilder {
    /// Optional; without it only the question itself is searched
    pub fn reformulator(mut self, reformulator: Arc<dyn QueryReformulator>) -> Self {
        self.reformulator = Some(reformulator);
        self
    }

    pub fn judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn EvidenceExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchAdapter>) -> Self {
        self.search = Some(search);
        self
    }

    /// Optional; without it extraction works from title and abstract
    pub fn full_text(mut self, full_text: Arc<dyn FullTextSource>) -> Self {
        self.full_text = Some(full_text);
        self
    }

    /// Validate the configuration and wire up the stages
    pub fn build(self) -> Result<ResearchPipeline> {
        self.config.validate()?;

        let judge = self
            .judge
            .ok_or_else(|| MetaboError::Config("pipeline needs a relevance judge".to_string()))?;
        let extractor = self.extractor.ok_or_else(|| {
            MetaboError::Config("pipeline needs an evidence extractor".to_string())
        })?;
        let search = self
            .search
            .ok_or_else(|| MetaboError::Config("pipeline needs a search adapter".to_string()))?;

        let config = self.config;
        let judgment_timeout = Duration::from_secs(config.judgment_timeout_secs);

        Ok(ResearchPipeline {
            reformulate: ReformulateStage {
                reformulator: self.reformulator,
                max_queries: config.max_reformulations,
                timeout: judgment_timeout,
            },
            search: SearchStage {
                adapter: search,
                max_candidates: config.max_candidates_per_query,
                timeout: Duration::from_secs(config.search_timeout_secs),
                concurrency: config.max_concurrency,
            },
            filter: FilterStage {
                judge,
                timeout: judgment_timeout,
                concurrency: config.max_concurrency,
                require_focus_terms: config.require_focus_terms,
            },
            extract: ExtractStage {
                extractor,
                full_text: self.full_text,
                timeout: judgment_timeout,
                concurrency: config.max_concurrency,
                max_full_text_chars: config.max_full_text_chars,
                require_focus_terms: config.require_focus_terms,
            },
            llm: self.llm,
        })
    }
}

impl ResearchPipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            reformulator: None,
            judge: None,
            extractor: None,
            search: None,
            full_text: None,
            llm: None,
        }
    }

    /// Wire the HTTP LLM backend and Europe PMC from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let prompts = config.prompts()?;
        Self::from_config_with_prompts(config, &prompts)
    }

    pub fn from_config_with_prompts(config: &Config, prompts: &PromptSet) -> Result<Self> {
        let llm = Arc::new(VLLMClient::new(config.llm_service.clone())?);
        let client: Arc<dyn LLMClient> = llm.clone();
        let literature = Arc::new(EuropePmcClient::new(config.literature.clone())?);

        let mut builder = Self::builder(config.pipeline.clone())
            .reformulator(Arc::new(HttpQueryReformulator::new(
                Arc::clone(&client),
                prompts.reformulator.as_str(),
            )))
            .judge(Arc::new(HttpRelevanceJudge::new(
                Arc::clone(&client),
                prompts.evaluator.as_str(),
            )))
            .extractor(Arc::new(HttpEvidenceExtractor::new(
                client,
                prompts.extractor.as_str(),
            )))
            .search(literature.clone());

        if config.literature.fetch_full_text {
            builder = builder.full_text(literature);
        }
        builder.llm = Some(llm);

        builder.build()
    }

    /// Search adapter the pipeline queries
    pub fn search_adapter(&self) -> &dyn SearchAdapter {
        self.search.adapter.as_ref()
    }

    /// Full-text source used for extraction, when one is configured
    pub fn full_text_source(&self) -> Option<&dyn FullTextSource> {
        self.extract.full_text.as_deref()
    }

    /// Metrics of the HTTP LLM client, when the pipeline owns one
    pub fn llm_metrics(&self) -> Option<MetricsSnapshot> {
        self.llm.as_ref().map(|llm| llm.metrics())
    }

    /// Answer a research question
    ///
    /// Never fails once built: upstream, malformed and timed-out calls are
    /// absorbed per document, and an empty result is the explicit
    /// no-evidence answer.
    pub async fn answer(&self, query: ResearchQuery) -> SynthesizedAnswer {
        let started = Instant::now();
        let query = Arc::new(query);
        let mut stats = PipelineStats::default();

        let (focus, reformulations) = self.reformulate.run(&query).await;
        stats.reformulations = reformulations.len();
        match focus {
            Some(ref focus) => tracing::info!(
                metabolite = focus.metabolite(),
                condition = focus.condition(),
                phrasings = reformulations.len(),
                "Reformulated question"
            ),
            None => tracing::info!(
                phrasings = reformulations.len(),
                "Reformulated question, focus unknown"
            ),
        }

        let documents = self.search.run(&reformulations, &mut stats).await;
        tracing::info!(
            candidates = stats.candidates,
            unique = stats.unique_documents,
            failed_searches = stats.failed_searches,
            "Search finished"
        );

        let relevant = self
            .filter
            .run(&query, focus.as_ref(), documents, &mut stats)
            .await;
        tracing::info!(relevant = stats.relevant, "Relevance filter finished");

        let extractions = self
            .extract
            .run(&query, focus.as_ref(), relevant, &mut stats)
            .await;

        let (entries, text, outcome) = aggregate(extractions);
        stats.cited = entries.len();
        tracing::info!(
            cited = stats.cited,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Answer ready"
        );

        SynthesizedAnswer {
            query: query.text().to_string(),
            focus,
            reformulations: reformulations.iter().map(|q| q.text().to_string()).collect(),
            entries,
            text,
            outcome,
            stats,
            generated_at: Utc::now(),
        }
    }

    /// Answer a free-text question; only a blank question is an error
    pub async fn answer_text(&self, question: &str) -> Result<SynthesizedAnswer> {
        let query = ResearchQuery::new(question)?;
        Ok(self.answer(query).await)
    }
}
