//! Data models for the PyPI Downloads MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod conversation;
pub mod query;

// Re-export commonly used types
pub use conversation::{Message, MessageRole};
pub use query::{ColumnMetadata, QueryResult, Row};
