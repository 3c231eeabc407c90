//! MCP server command

use anyhow::Result;
use metabo_core::{Config, ResearchPipeline};

pub async fn run(config: &Config) -> Result<()> {
    let pipeline = ResearchPipeline::from_config(config)?;
    metabo_mcp::start_server(&pipeline).await
}
