//! CLI command handlers

pub mod answer;
pub mod config;
pub mod mcp;
pub mod search;
