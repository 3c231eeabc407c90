//! Literature search command

use crate::app::{OutputFormat, SearchArgs};
use crate::output;
use anyhow::Result;
use metabo_core::{search_documents, Config, EuropePmcClient, MetaboError};

pub async fn run(args: SearchArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let query = args.query.join(" ");
    if query.trim().is_empty() {
        return Err(MetaboError::InvalidInput("search query must not be empty".to_string()).into());
    }
    config.validate()?;

    let client = EuropePmcClient::new(config.literature.clone())?;
    let documents = search_documents(&client, &query, args.limit).await?;

    print!("{}", output::format_documents(&documents, &query, format));
    Ok(())
}
