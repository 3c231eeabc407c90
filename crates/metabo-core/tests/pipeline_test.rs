//! End-to-end tests of the research pipeline against scripted backends
//!
//! No network: the LLM, the search adapter and the full-text source are all
//! in-process stubs.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metabo_core::{
    AnswerOutcome, CandidateDocument, ChatMessage, ChatOptions, DocumentStream, EvidenceExtractor,
    Extraction, FullText, FullTextSource, HttpEvidenceExtractor, HttpQueryReformulator,
    HttpRelevanceJudge, LLMClient, MetaboError, PipelineConfig, PromptSet, QueryFocus,
    RelevanceJudge, RelevanceVerdict, ResearchPipeline, ResearchQuery, Result, SearchAdapter,
    NO_EVIDENCE_TEXT,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Reformulator,
    Evaluator,
    Extractor,
}

type Script = Box<dyn Fn(Role, &str) -> Result<String> + Send + Sync>;

/// LLM stub that answers according to which stage is asking
struct ScriptedLlm {
    prompts: PromptSet,
    script: Script,
    extractor_calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            prompts: PromptSet::builtin(),
            script,
            extractor_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        _options: &ChatOptions,
    ) -> Result<String> {
        let system = &messages[0].content;
        let role = if *system == self.prompts.reformulator {
            Role::Reformulator
        } else if *system == self.prompts.evaluator {
            Role::Evaluator
        } else {
            self.extractor_calls.fetch_add(1, Ordering::SeqCst);
            Role::Extractor
        };
        (self.script)(role, &messages[1].content)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Everything after the query line: the paper as the backend sees it
fn paper_section(prompt: &str) -> &str {
    prompt.split_once("\n\n# ").map(|(_, paper)| paper).unwrap_or("")
}

/// Returns the same documents for every query
struct StaticAdapter {
    documents: Vec<CandidateDocument>,
    queries: Mutex<Vec<String>>,
}

impl StaticAdapter {
    fn new(documents: Vec<CandidateDocument>) -> Arc<Self> {
        Arc::new(Self {
            documents,
            queries: Mutex::new(Vec::new()),
        })
    }
}

impl SearchAdapter for StaticAdapter {
    fn name(&self) -> &str {
        "static"
    }

    fn search<'a>(&'a self, query: &'a str) -> DocumentStream<'a> {
        self.queries.lock().unwrap().push(query.to_string());
        stream::iter(self.documents.clone().into_iter().map(Ok::<_, MetaboError>)).boxed()
    }
}

/// Fails any query mentioning `poison` after yielding one hit
struct FlakyAdapter {
    poison: &'static str,
}

impl SearchAdapter for FlakyAdapter {
    fn name(&self) -> &str {
        "flaky"
    }

    fn search<'a>(&'a self, query: &'a str) -> DocumentStream<'a> {
        if query.contains(self.poison) {
            let hits = vec![
                Ok(CandidateDocument::new(
                    "from-failed-search",
                    "Butyrate and colitis",
                    "Butyrate and colitis in mice.",
                )),
                Err(MetaboError::Search("HTTP 503".to_string())),
            ];
            stream::iter(hits).boxed()
        } else {
            stream::iter(vec![Ok::<_, MetaboError>(CandidateDocument::new(
                "kept",
                "Butyrate reduces colitis severity",
                "Butyrate supplementation reduced colitis scores.",
            ))])
            .boxed()
        }
    }
}

const PROPIONIC_QUESTION: &str = "Does propionic acid affect colorectal cancer risk?";

fn propionic_documents() -> Vec<CandidateDocument> {
    vec![
        CandidateDocument::new(
            "31000001",
            "Propionic acid induces apoptosis in colorectal cancer cells",
            "Propionic acid reduced proliferation of colorectal cancer cell lines in vitro.",
        ),
        CandidateDocument::new(
            "31000002",
            "Fecal short-chain fatty acids and colorectal cancer risk",
            "Higher fecal propionic acid was associated with a lower colorectal cancer risk in a cohort of 1,200 adults.",
        ),
        CandidateDocument::new(
            "31000003",
            "Propionic acid production by Bacteroides in continuous culture",
            "We characterise propionic acid yields under varying pH.",
        ),
    ]
}

fn propionic_script() -> Script {
    Box::new(|role: Role, prompt: &str| match role {
        Role::Reformulator => Ok(r#"{"metabolite": "propionic acid", "condition": "colorectal cancer",
            "reformulations": ["Is propionic acid associated with colorectal cancer risk?",
                               "Propionic acid and colorectal cancer incidence"]}"#
            .to_string()),
        Role::Evaluator => {
            let paper = paper_section(prompt).to_lowercase();
            let relevant = paper.contains("propionic acid") && paper.contains("colorectal cancer");
            Ok(format!(
                r#"{{"relevant": "{}"}}"#,
                if relevant { "yes" } else { "no" }
            ))
        }
        Role::Extractor => Ok(
            "The study reports that propionic acid may lower colorectal cancer risk. \
             The authors describe the evidence as preliminary."
                .to_string(),
        ),
    })
}

fn pipeline_with(
    llm: Arc<ScriptedLlm>,
    search: Arc<dyn SearchAdapter>,
    config: PipelineConfig,
) -> ResearchPipeline {
    let client: Arc<dyn LLMClient> = llm.clone();
    let prompts = PromptSet::builtin();
    ResearchPipeline::builder(config)
        .reformulator(Arc::new(HttpQueryReformulator::new(
            client.clone(),
            prompts.reformulator.as_str(),
        )))
        .judge(Arc::new(HttpRelevanceJudge::new(
            client.clone(),
            prompts.evaluator.as_str(),
        )))
        .extractor(Arc::new(HttpEvidenceExtractor::new(
            client,
            prompts.extractor.as_str(),
        )))
        .search(search)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_propionic_acid_end_to_end() {
    let llm = ScriptedLlm::new(propionic_script());
    let adapter = StaticAdapter::new(propionic_documents());
    let pipeline = pipeline_with(llm.clone(), adapter.clone(), PipelineConfig::default());

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert_eq!(answer.outcome, AnswerOutcome::Evidence);
    assert_eq!(answer.citations(), vec!["31000001", "31000002"]);
    assert!(!answer.text.contains("31000003"));
    assert!(answer
        .text
        .starts_with("[31000001] Propionic acid induces apoptosis in colorectal cancer cells\n\n"));

    // Third document stopped at the filter, never reached the extractor
    assert_eq!(answer.stats.relevant, 2);
    assert_eq!(llm.extractor_calls.load(Ordering::SeqCst), 2);

    // Three phrasings, same three hits each, de-duplicated before fan-out
    assert_eq!(answer.reformulations.len(), 3);
    assert_eq!(answer.reformulations[0], PROPIONIC_QUESTION);
    assert_eq!(adapter.queries.lock().unwrap().len(), 3);
    assert_eq!(answer.stats.candidates, 9);
    assert_eq!(answer.stats.unique_documents, 3);
    assert_eq!(answer.focus.unwrap().metabolite(), "propionic acid");
}

#[tokio::test]
async fn test_judge_alone_excludes_single_entity_document() {
    let llm = ScriptedLlm::new(propionic_script());
    let config = PipelineConfig {
        require_focus_terms: false,
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_with(llm.clone(), StaticAdapter::new(propionic_documents()), config);

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert_eq!(answer.citations(), vec!["31000001", "31000002"]);
    assert_eq!(llm.extractor_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_documents_is_no_evidence() {
    let llm = ScriptedLlm::new(propionic_script());
    let pipeline = pipeline_with(llm, StaticAdapter::new(Vec::new()), PipelineConfig::default());

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert!(answer.is_no_evidence());
    assert_eq!(answer.text, NO_EVIDENCE_TEXT);
    assert!(answer.entries.is_empty());
}

#[tokio::test]
async fn test_malformed_verdicts_count_as_not_relevant() {
    let llm = ScriptedLlm::new(Box::new(|role: Role, _: &str| match role {
        Role::Reformulator => Ok("no json here".to_string()),
        Role::Evaluator => Ok(r#"{"relevant": "probably"}"#.to_string()),
        Role::Extractor => Ok("Should never be asked.".to_string()),
    }));
    let pipeline = pipeline_with(
        llm.clone(),
        StaticAdapter::new(propionic_documents()),
        PipelineConfig {
            require_focus_terms: false,
            ..PipelineConfig::default()
        },
    );

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert!(answer.is_no_evidence());
    assert_eq!(answer.stats.judgment_failures, 3);
    assert_eq!(llm.extractor_calls.load(Ordering::SeqCst), 0);
    // Unparseable reformulation degrades to the question alone
    assert_eq!(answer.reformulations, vec![PROPIONIC_QUESTION.to_string()]);
}

#[tokio::test]
async fn test_extractor_sentinel_and_markdown_are_empty() {
    let llm = ScriptedLlm::new(Box::new(|role: Role, prompt: &str| match role {
        Role::Reformulator => Ok("{}".to_string()),
        Role::Evaluator => Ok(r#"{"relevant": "yes"}"#.to_string()),
        Role::Extractor if prompt.contains("apoptosis") => Ok("NOT_RELEVANT".to_string()),
        Role::Extractor => Ok("## Findings\n- lower risk".to_string()),
    }));
    let pipeline = pipeline_with(
        llm,
        StaticAdapter::new(propionic_documents()),
        PipelineConfig::default(),
    );

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    // No focus could be inferred, so every document reaches the judge
    assert!(answer.is_no_evidence());
    assert_eq!(answer.stats.relevant, 3);
    assert_eq!(answer.stats.empty_extractions, 3);
    assert_eq!(answer.stats.extraction_failures, 2);
}

#[tokio::test]
async fn test_failed_search_discards_its_hits() {
    let llm = ScriptedLlm::new(Box::new(|role: Role, _: &str| match role {
        Role::Reformulator => Ok(r#"{"metabolite": "butyrate", "condition": "colitis",
            "reformulations": ["Butyrate and colitis in a mouse cohort"]}"#
            .to_string()),
        Role::Evaluator => Ok(r#"{"relevant": "yes"}"#.to_string()),
        Role::Extractor => {
            Ok("Butyrate supplementation was associated with milder colitis.".to_string())
        }
    }));
    let pipeline = pipeline_with(
        llm,
        Arc::new(FlakyAdapter { poison: "cohort" }),
        PipelineConfig::default(),
    );

    let answer = pipeline
        .answer_text("Does butyrate protect against colitis?")
        .await
        .unwrap();

    assert_eq!(answer.stats.failed_searches, 1);
    assert_eq!(answer.citations(), vec!["kept"]);
}

/// Extractor that stalls on one document
struct StallingExtractor;

#[async_trait]
impl EvidenceExtractor for StallingExtractor {
    async fn extract(
        &self,
        _query: &str,
        document: &CandidateDocument,
        _full_text: Option<&str>,
    ) -> Result<Extraction> {
        if document.id == "31000001" {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(Extraction::Synthesis(format!("Findings of {}.", document.id)))
    }

    fn model_name(&self) -> &str {
        "stalling"
    }
}

#[tokio::test(start_paused = true)]
async fn test_extraction_timeout_is_empty_not_fatal() {
    let llm = ScriptedLlm::new(propionic_script());
    let client: Arc<dyn LLMClient> = llm;
    let prompts = PromptSet::builtin();
    let pipeline = ResearchPipeline::builder(PipelineConfig {
        judgment_timeout_secs: 5,
        ..PipelineConfig::default()
    })
    .judge(Arc::new(HttpRelevanceJudge::new(
        client,
        prompts.evaluator.as_str(),
    )))
    .extractor(Arc::new(StallingExtractor))
    .search(StaticAdapter::new(propionic_documents()))
    .build()
    .unwrap();

    let query = ResearchQuery::new(PROPIONIC_QUESTION)
        .unwrap()
        .with_focus(QueryFocus::new("propionic acid", "colorectal cancer").unwrap());
    let answer = pipeline.answer(query).await;

    assert_eq!(answer.citations(), vec!["31000002"]);
    assert_eq!(answer.stats.extraction_failures, 1);
    assert_eq!(answer.reformulations.len(), 1);
}

/// Records the full text each extraction received
struct RecordingExtractor {
    seen: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl EvidenceExtractor for RecordingExtractor {
    async fn extract(
        &self,
        _query: &str,
        document: &CandidateDocument,
        full_text: Option<&str>,
    ) -> Result<Extraction> {
        self.seen
            .lock()
            .unwrap()
            .push(full_text.map(|t| t.to_string()));
        Ok(Extraction::Synthesis(format!("Findings of {}.", document.id)))
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

struct LongFullText;

#[async_trait]
impl FullTextSource for LongFullText {
    async fn fetch_full_text(&self, document_id: &str) -> Result<FullText> {
        match document_id {
            "31000001" => Ok(FullText::Available("x".repeat(500))),
            "31000002" => Err(MetaboError::Search("HTTP 500".to_string())),
            _ => Ok(FullText::Unavailable),
        }
    }
}

#[tokio::test]
async fn test_full_text_truncated_and_failures_fall_back() {
    let llm = ScriptedLlm::new(propionic_script());
    let client: Arc<dyn LLMClient> = llm;
    let extractor = Arc::new(RecordingExtractor {
        seen: Mutex::new(Vec::new()),
    });
    let pipeline = ResearchPipeline::builder(PipelineConfig {
        max_full_text_chars: 100,
        max_concurrency: 1,
        ..PipelineConfig::default()
    })
    .judge(Arc::new(HttpRelevanceJudge::new(
        client,
        PromptSet::builtin().evaluator.as_str(),
    )))
    .extractor(extractor.clone())
    .search(StaticAdapter::new(propionic_documents()))
    .full_text(Arc::new(LongFullText))
    .build()
    .unwrap();

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();
    assert_eq!(answer.citations().len(), 2);

    let seen = extractor.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&Some("x".repeat(100))));
    assert!(seen.contains(&None));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let llm = ScriptedLlm::new(propionic_script());
    let client: Arc<dyn LLMClient> = llm;

    let zero = ResearchPipeline::builder(PipelineConfig {
        max_reformulations: 0,
        ..PipelineConfig::default()
    })
    .judge(Arc::new(HttpRelevanceJudge::new(client.clone(), "sys")))
    .extractor(Arc::new(HttpEvidenceExtractor::new(client.clone(), "sys")))
    .search(StaticAdapter::new(Vec::new()))
    .build();
    match zero {
        Err(err) => {
            assert!(err.is_config());
            assert_eq!(err.exit_code(), 3);
        }
        Ok(_) => panic!("zero reformulations must be rejected"),
    }

    let missing_judge = ResearchPipeline::builder(PipelineConfig::default())
        .extractor(Arc::new(HttpEvidenceExtractor::new(client, "sys")))
        .search(StaticAdapter::new(Vec::new()))
        .build();
    assert!(matches!(missing_judge, Err(MetaboError::Config(_))));
}

#[tokio::test]
async fn test_blank_question_is_invalid_input() {
    let llm = ScriptedLlm::new(propionic_script());
    let pipeline = pipeline_with(llm, StaticAdapter::new(Vec::new()), PipelineConfig::default());

    assert!(matches!(
        pipeline.answer_text("   ").await,
        Err(MetaboError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_boolean_verdicts_are_protocol_violations() {
    let llm = ScriptedLlm::new(Box::new(|role: Role, _: &str| match role {
        Role::Reformulator => Ok("{}".to_string()),
        Role::Evaluator => Ok(r#"{"relevant": true}"#.to_string()),
        Role::Extractor => Ok("Should never be asked.".to_string()),
    }));
    let pipeline = pipeline_with(
        llm.clone(),
        StaticAdapter::new(propionic_documents()),
        PipelineConfig::default(),
    );

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert!(answer.is_no_evidence());
    assert_eq!(answer.stats.judgment_failures, 3);
    assert_eq!(llm.extractor_calls.load(Ordering::SeqCst), 0);
}

/// Yields hits without end; only the per-phrasing cap stops it
struct EndlessAdapter;

impl SearchAdapter for EndlessAdapter {
    fn name(&self) -> &str {
        "endless"
    }

    fn search<'a>(&'a self, _query: &'a str) -> DocumentStream<'a> {
        stream::iter((0u64..).map(|i| {
            Ok::<_, MetaboError>(CandidateDocument::new(
                format!("endless-{}", i),
                "Bacterial fermentation yields",
                "Short-chain fatty acid output in culture.",
            ))
        }))
        .boxed()
    }
}

#[tokio::test]
async fn test_candidate_cap_truncates_each_phrasing() {
    let llm = ScriptedLlm::new(propionic_script());
    let pipeline = pipeline_with(
        llm.clone(),
        Arc::new(EndlessAdapter),
        PipelineConfig {
            max_candidates_per_query: 4,
            ..PipelineConfig::default()
        },
    );

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert_eq!(answer.reformulations.len(), 3);
    assert_eq!(answer.stats.candidates, 4 * 3);
    assert_eq!(answer.stats.unique_documents, 4);
    assert_eq!(answer.stats.failed_searches, 0);
    assert!(answer.is_no_evidence());
}

/// Never yields a hit
struct StallingAdapter;

impl SearchAdapter for StallingAdapter {
    fn name(&self) -> &str {
        "stalling"
    }

    fn search<'a>(&'a self, _query: &'a str) -> DocumentStream<'a> {
        stream::pending::<Result<CandidateDocument>>().boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_search_timeout_is_an_empty_candidate_set() {
    let llm = ScriptedLlm::new(propionic_script());
    let pipeline = pipeline_with(
        llm.clone(),
        Arc::new(StallingAdapter),
        PipelineConfig {
            search_timeout_secs: 5,
            ..PipelineConfig::default()
        },
    );

    let answer = pipeline.answer_text(PROPIONIC_QUESTION).await.unwrap();

    assert!(answer.is_no_evidence());
    assert_eq!(answer.text, NO_EVIDENCE_TEXT);
    assert_eq!(answer.stats.failed_searches, 3);
    assert_eq!(answer.stats.candidates, 0);
    assert_eq!(llm.extractor_calls.load(Ordering::SeqCst), 0);
}

/// Judge that stalls on one document and accepts the rest
struct StallingJudge;

#[async_trait]
impl RelevanceJudge for StallingJudge {
    async fn judge(&self, _query: &str, document: &CandidateDocument) -> Result<RelevanceVerdict> {
        if document.id == "31000002" {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(RelevanceVerdict::Relevant)
    }

    fn model_name(&self) -> &str {
        "stalling"
    }
}

#[tokio::test(start_paused = true)]
async fn test_judgment_timeout_is_not_relevant() {
    let extractor = Arc::new(RecordingExtractor {
        seen: Mutex::new(Vec::new()),
    });
    let pipeline = ResearchPipeline::builder(PipelineConfig {
        judgment_timeout_secs: 5,
        ..PipelineConfig::default()
    })
    .judge(Arc::new(StallingJudge))
    .extractor(extractor.clone())
    .search(StaticAdapter::new(propionic_documents()))
    .build()
    .unwrap();

    let query = ResearchQuery::new(PROPIONIC_QUESTION)
        .unwrap()
        .with_focus(QueryFocus::new("propionic acid", "colorectal cancer").unwrap());
    let answer = pipeline.answer(query).await;

    // 31000003 never reaches the judge: its abstract lacks the condition
    assert_eq!(answer.citations(), vec!["31000001"]);
    assert_eq!(answer.stats.relevant, 1);
    assert_eq!(answer.stats.judgment_failures, 1);
    assert_eq!(extractor.seen.lock().unwrap().len(), 1);
}
