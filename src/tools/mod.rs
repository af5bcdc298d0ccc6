//! MCP tool implementations.
//!
//! - `pypi_downloads`: the question-answering tool and its per-call wiring
//! - `sql_validator`: extraction and structural checking of generated SQL
//! - `format`: XML rendering of result rows

pub mod format;
pub mod pypi_downloads;
pub mod sql_validator;

pub use pypi_downloads::{PypiDownloadsHandler, PypiDownloadsInput, ToolSettings};
