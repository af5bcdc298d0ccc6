//! Warehouse access.
//!
//! This module provides the SQL execution boundary used by the query agent:
//! - `Warehouse`: the narrow trait the agent depends on
//! - `bigquery`: BigQuery REST client (`jobs.query` / `jobs.getQueryResults`)
//! - `credentials`: service-account and application-default credential resolution
//! - `types`: decoding of BigQuery's `f`/`v` row encoding into ordered JSON maps

pub mod bigquery;
pub mod credentials;
pub mod types;

pub use bigquery::{BigQueryClient, BigQuerySettings};
pub use credentials::{CredentialSource, ServiceAccountKey};

use crate::error::AgentResult;
use crate::models::QueryResult;
use std::future::Future;

/// Executes SQL and materializes the full result set.
///
/// Implementations report malformed statements as `AgentError::BadRequest`
/// and every other failure as a terminal error.
pub trait Warehouse: Send + Sync + 'static {
    fn query(&self, sql: &str) -> impl Future<Output = AgentResult<QueryResult>> + Send;
}
