//! Configuration commands

use crate::app::{ConfigAction, ConfigArgs, OutputFormat};
use anyhow::Result;
use metabo_core::{Config, MetaboError};
use std::path::Path;

pub async fn run(args: ConfigArgs, path: &Path, format: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let mut config = Config::load_from(path)?;
            config.validate()?;
            if config.llm_service.api_key.is_some() {
                config.llm_service.api_key = Some("********".to_string());
            }
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                _ => print!("{}", serde_yaml::to_string(&config)?),
            }
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(MetaboError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ))
                .into());
            }
            Config::default().save_to(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
