//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metabo")]
#[command(
    author,
    version,
    about = "Answer metabolite/condition questions from the PubMed literature"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "METABO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a research question with cited syntheses
    Answer(AnswerArgs),

    /// List literature records without synthesizing an answer
    Search(SearchArgs),

    /// Start MCP server on stdio
    Mcp,

    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct AnswerArgs {
    /// Research question naming a metabolite and a health condition
    pub question: Vec<String>,

    /// Metabolite the question is about (skips inference)
    #[arg(long, requires = "condition")]
    pub metabolite: Option<String>,

    /// Health condition the question is about (skips inference)
    #[arg(long, requires = "metabolite")]
    pub condition: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    pub query: Vec<String>,

    /// Number of results
    #[arg(short = 'n', default_value = "10")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
    Md,
}
