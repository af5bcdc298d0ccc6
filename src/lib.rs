//! PyPI Downloads MCP Server Library
//!
//! This library provides an MCP (Model Context Protocol) tool that answers
//! questions about Python package downloads. A model writes BigQuery SQL
//! against `bigquery-public-data.pypi.file_downloads`, the statement is
//! checked and executed, and rejected statements are fed back for correction.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;
pub mod warehouse;

pub use agent::{Answer, AnswerKind, QueryAgent};
pub use config::Config;
pub use error::{AgentError, AgentResult};
pub use mcp::PypiService;
