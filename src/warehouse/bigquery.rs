//! BigQuery REST client.
//!
//! Queries run through `jobs.query`; when the job has not finished within the
//! request's wait window, or the result spans several pages, the client keeps
//! calling `jobs.getQueryResults` until every row is in hand.

use crate::error::{AgentError, AgentResult};
use crate::models::QueryResult;
use crate::warehouse::Warehouse;
use crate::warehouse::credentials::{AccessToken, CredentialSource};
use crate::warehouse::types::{TableRow, TableSchema, decode_rows};
use humansize::{DECIMAL, format_size};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// How long each API call asks BigQuery to wait for the job before returning.
const POLL_WAIT: Duration = Duration::from_secs(10);

/// Extra time allowed on top of the wait window for the HTTP round trip.
const REQUEST_GRACE: Duration = Duration::from_secs(30);

const INVALID_QUERY_REASON: &str = "invalidQuery";

/// Everything needed to build a [`BigQueryClient`].
#[derive(Debug, Clone)]
pub struct BigQuerySettings {
    /// Base URL of the REST API, e.g. `https://bigquery.googleapis.com/bigquery/v2`
    pub endpoint: Url,
    /// Billing project; resolved from the credentials when absent
    pub project: Option<String>,
    pub location: Option<String>,
    pub credentials: CredentialSource,
    pub query_timeout: Duration,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    format_options: FormatOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatOptions {
    use_int64_timestamp: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
    /// int64 values are serialized as strings
    #[serde(default)]
    total_bytes_processed: Option<String>,
    #[serde(default)]
    cache_hit: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// BigQuery client with a per-client access-token cache.
pub struct BigQueryClient {
    http: reqwest::Client,
    settings: BigQuerySettings,
    token: Mutex<Option<AccessToken>>,
    project: OnceCell<String>,
}

impl BigQueryClient {
    pub fn new(settings: BigQuerySettings) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(POLL_WAIT + REQUEST_GRACE)
            .build()
            .map_err(|e| AgentError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(http, settings))
    }

    pub fn with_http_client(http: reqwest::Client, settings: BigQuerySettings) -> Self {
        Self {
            http,
            settings,
            token: Mutex::new(None),
            project: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &BigQuerySettings {
        &self.settings
    }

    /// Return a cached bearer token, refreshing it when close to expiry.
    async fn access_token(&self) -> AgentResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expiring()) {
            return Ok(token.token.clone());
        }
        let fresh = self.settings.credentials.fetch_token(&self.http).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Project billed for query jobs.
    async fn billing_project(&self) -> AgentResult<&str> {
        self.project
            .get_or_try_init(|| self.resolve_project())
            .await
            .map(String::as_str)
    }

    /// Configured project, then the credentials' own, then the metadata server's.
    async fn resolve_project(&self) -> AgentResult<String> {
        if let Some(project) = self.settings.project.as_deref() {
            return Ok(project.to_string());
        }
        if let Some(project) = self.settings.credentials.project_id() {
            return Ok(project.to_string());
        }
        self.settings
            .credentials
            .metadata_project_id(&self.http)
            .await?
            .ok_or_else(|| {
                AgentError::credentials(
                    "No billing project could be determined",
                    "Set --project or GOOGLE_CLOUD_PROJECT",
                )
            })
    }

    fn api_url(&self, segments: &[&str]) -> AgentResult<Url> {
        let mut url = self.settings.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AgentError::internal(format!(
                    "BigQuery endpoint {} cannot be a base URL",
                    self.settings.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn start_query(&self, project: &str, sql: &str, token: &str) -> AgentResult<QueryResponse> {
        let url = self.api_url(&["projects", project, "queries"])?;
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            timeout_ms: POLL_WAIT.as_millis() as u64,
            request_id: Uuid::new_v4().to_string(),
            location: self.settings.location.as_deref(),
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };
        let response = self.http.post(url).bearer_auth(token).json(&body).send().await?;
        parse_response(response).await
    }

    async fn fetch_results(
        &self,
        project: &str,
        job: &JobReference,
        page_token: Option<&str>,
        token: &str,
    ) -> AgentResult<QueryResponse> {
        let url = self.api_url(&["projects", project, "queries", &job.job_id])?;
        let mut params = vec![("timeoutMs", POLL_WAIT.as_millis().to_string())];
        if let Some(location) = job.location.as_deref().or(self.settings.location.as_deref()) {
            params.push(("location", location.to_string()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        parse_response(response).await
    }

    /// Fail once a query has spent longer than its timeout polling or paging.
    fn check_deadline(&self, start: Instant) -> AgentResult<()> {
        if start.elapsed() > self.settings.query_timeout {
            return Err(AgentError::timeout(
                "BigQuery job",
                self.settings.query_timeout.as_secs(),
            ));
        }
        Ok(())
    }
}

impl Warehouse for BigQueryClient {
    async fn query(&self, sql: &str) -> AgentResult<QueryResult> {
        let start = Instant::now();
        let project = self.billing_project().await?;
        let token = self.access_token().await?;

        let mut response = self.start_query(project, sql, &token).await?;
        let job = response
            .job_reference
            .clone()
            .ok_or_else(|| AgentError::internal("BigQuery response has no job reference"))?;
        debug!(job_id = %job.job_id, project, "Query job created");

        while !response.job_complete {
            self.check_deadline(start)?;
            debug!(job_id = %job.job_id, "Job not complete, polling");
            let token = self.access_token().await?;
            response = self.fetch_results(project, &job, None, &token).await?;
        }

        let schema = response.schema.take().unwrap_or_default();
        let mut rows = decode_rows(&schema, &response.rows);
        let mut page_token = response.page_token.take();
        let mut pages = 1;

        while let Some(current) = page_token {
            self.check_deadline(start)?;
            let token = self.access_token().await?;
            let page = self
                .fetch_results(project, &job, Some(&current), &token)
                .await?;
            rows.extend(decode_rows(&schema, &page.rows));
            page_token = page.page_token;
            pages += 1;
        }

        let total_bytes_processed = response
            .total_bytes_processed
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok());
        let execution_time_ms = start.elapsed().as_millis() as u64;
        let bytes_processed = total_bytes_processed
            .map(|b| format_size(b, DECIMAL))
            .unwrap_or_else(|| "unknown".to_string());

        info!(
            job_id = %job.job_id,
            rows = rows.len(),
            pages,
            bytes_processed = %bytes_processed,
            cache_hit = response.cache_hit.unwrap_or(false),
            elapsed_ms = execution_time_ms,
            "Query completed"
        );

        Ok(QueryResult {
            columns: schema.fields.iter().map(Into::into).collect(),
            rows,
            total_bytes_processed,
            cache_hit: response.cache_hit.unwrap_or(false),
            execution_time_ms,
        })
    }
}

/// Turn an HTTP response into a parsed body or a classified error.
async fn parse_response(response: reqwest::Response) -> AgentResult<QueryResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_error_response(status.as_u16(), &body))
}

/// Classify a failed API call.
///
/// HTTP 400 and the `invalidQuery` reason mean the statement itself is bad and
/// the generator may try again; everything else is terminal.
fn map_error_response(status: u16, body: &str) -> AgentError {
    let (message, reason) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => {
            let reason = parsed.error.errors.into_iter().find_map(|e| e.reason);
            (parsed.error.message, reason)
        }
        Err(_) => (body.trim().to_string(), None),
    };
    let message = if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        message
    };

    if status == 400 || reason.as_deref() == Some(INVALID_QUERY_REASON) {
        debug!(status, ?reason, "BigQuery rejected the query");
        AgentError::bad_request(message, reason)
    } else {
        warn!(status, ?reason, error = %message, "BigQuery request failed");
        AgentError::warehouse(status, message, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::credentials::ServiceAccountKey;

    fn settings(endpoint: &str) -> BigQuerySettings {
        let key: ServiceAccountKey =
            serde_json::from_str(include_str!("../../tests/fixtures/service_account.json")).unwrap();
        BigQuerySettings {
            endpoint: Url::parse(endpoint).unwrap(),
            project: None,
            location: None,
            credentials: CredentialSource::ServiceAccount(key),
            query_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_api_url_appends_segments() {
        let client = BigQueryClient::new(settings("https://bigquery.googleapis.com/bigquery/v2")).unwrap();
        let url = client.api_url(&["projects", "my-project", "queries"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/my-project/queries"
        );
    }

    #[test]
    fn test_api_url_with_trailing_slash() {
        let client = BigQueryClient::new(settings("http://localhost:9050/bigquery/v2/")).unwrap();
        let url = client.api_url(&["projects", "p", "queries", "job_1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9050/bigquery/v2/projects/p/queries/job_1");
    }

    #[test]
    fn test_map_400_to_bad_request() {
        let body = r#"{"error":{"code":400,"message":"Syntax error: Unexpected keyword FORM at [1:10]","errors":[{"reason":"invalidQuery"}],"status":"INVALID_ARGUMENT"}}"#;
        let err = map_error_response(400, body);
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Invalid query: Syntax error: Unexpected keyword FORM at [1:10]"
        );
    }

    #[test]
    fn test_map_invalid_query_reason_to_bad_request() {
        let body = r#"{"error":{"code":404,"message":"Not found: Table x","errors":[{"reason":"invalidQuery"}]}}"#;
        assert!(matches!(map_error_response(404, body), AgentError::BadRequest { .. }));
    }

    #[test]
    fn test_map_403_to_terminal() {
        let body = r#"{"error":{"code":403,"message":"Access Denied","errors":[{"reason":"accessDenied"}],"status":"PERMISSION_DENIED"}}"#;
        let err = map_error_response(403, body);
        assert!(!err.is_retryable());
        match err {
            AgentError::Warehouse { status, reason, .. } => {
                assert_eq!(status, 403);
                assert_eq!(reason.as_deref(), Some("accessDenied"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_map_unparseable_body() {
        let err = map_error_response(502, "<html>Bad Gateway</html>");
        assert!(err.to_string().contains("Bad Gateway"));
        let err = map_error_response(500, "");
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_query_request_serialization() {
        let body = QueryRequest {
            query: "SELECT 1",
            use_legacy_sql: false,
            timeout_ms: 10_000,
            request_id: "id".to_string(),
            location: None,
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["useLegacySql"], false);
        assert_eq!(json["timeoutMs"], 10_000);
        assert_eq!(json["formatOptions"]["useInt64Timestamp"], true);
        assert!(json.get("location").is_none());
    }
}
