//! Metabo-research CLI
//!
//! Literature answers for questions linking a metabolite to a health condition.

use anyhow::Result;
use clap::Parser;
use metabo_core::error::exit_codes;
use metabo_core::{Config, MetaboError};

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries answers and the MCP stream, so logs go to stderr
    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Answer(args) => {
            let config = Config::load_from(&config_path)?;
            commands::answer::run(args, &config, cli.format).await
        }
        Commands::Search(args) => {
            let config = Config::load_from(&config_path)?;
            commands::search::run(args, &config, cli.format).await
        }
        Commands::Mcp => {
            let config = Config::load_from(&config_path)?;
            commands::mcp::run(&config).await
        }
        Commands::Config(args) => commands::config::run(args, &config_path, cli.format).await,
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<MetaboError>()
        .map(MetaboError::exit_code)
        .unwrap_or(exit_codes::GENERAL_ERROR)
}
