//! Metabo-research MCP Server
//!
//! Model Context Protocol server exposing the literature pipeline to AI assistants.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{start_server, McpServer};
