//! Answer command

use crate::app::{AnswerArgs, OutputFormat};
use crate::output;
use anyhow::Result;
use metabo_core::{Config, MetaboError, QueryFocus, ResearchPipeline, ResearchQuery};

pub async fn run(args: AnswerArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let mut query = ResearchQuery::new(args.question.join(" "))?;

    if let (Some(metabolite), Some(condition)) = (&args.metabolite, &args.condition) {
        let focus = QueryFocus::new(metabolite, condition).ok_or_else(|| {
            MetaboError::InvalidInput("--metabolite and --condition must not be blank".to_string())
        })?;
        query = query.with_focus(focus);
    }

    let pipeline = ResearchPipeline::from_config(config)?;
    let answer = pipeline.answer(query).await;

    if let Some(metrics) = pipeline.llm_metrics() {
        tracing::info!(
            requests = metrics.total_requests,
            errors = metrics.total_errors,
            cache_hits = metrics.cache_hits,
            avg_latency_ms = metrics.avg_latency_ms,
            "LLM usage"
        );
    }

    print!("{}", output::format_answer(&answer, format));
    Ok(())
}
