//! Google Cloud credential resolution and OAuth2 access tokens.
//!
//! Credentials come from one of two places:
//! - an explicit service-account key (the `SERVICE_ACCOUNT_CONTENT` JSON blob)
//! - application default credentials: `GOOGLE_APPLICATION_CREDENTIALS`, then
//!   the gcloud well-known file, then the GCE metadata server
//!
//! Every source can mint a short-lived bearer token for the BigQuery API.

use crate::error::{AgentError, AgentResult};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// OAuth2 scope requested for BigQuery access.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1/";

const CREDENTIALS_FILE_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const JWT_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// A service-account key as downloaded from the Cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// User credentials written by `gcloud auth application-default login`.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for AuthorizedUserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedUserCredentials")
            .field("client_id", &self.client_id)
            .field("quota_project_id", &self.quota_project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Shape of a credentials file, discriminated by its `type` field.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserCredentials),
}

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserCredentials),
    /// GCE/Cloud Run metadata server
    MetadataServer { base_url: Url },
}

/// A bearer token and the instant it stops being usable.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + expires_in,
        }
    }

    /// Whether the token should be replaced before the next request.
    pub fn is_expiring(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl CredentialSource {
    /// Resolve credentials: explicit service-account JSON when given, otherwise
    /// application default credentials.
    pub fn resolve(service_account_content: Option<&str>) -> AgentResult<Self> {
        match service_account_content.map(str::trim).filter(|s| !s.is_empty()) {
            Some(json) => {
                let source = Self::from_service_account_json(json)?;
                info!("Using service-account credentials from environment");
                Ok(source)
            }
            None => Self::application_default(),
        }
    }

    /// Parse a service-account key from its JSON text.
    pub fn from_service_account_json(json: &str) -> AgentResult<Self> {
        serde_json::from_str::<ServiceAccountKey>(json)
            .map(Self::ServiceAccount)
            .map_err(|e| {
                AgentError::credentials(
                    format!("Invalid service account JSON: {}", e),
                    "Set SERVICE_ACCOUNT_CONTENT to the full contents of a service-account key file",
                )
            })
    }

    /// Load a credentials file (service account or authorized user).
    pub fn from_file(path: &Path) -> AgentResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::credentials(
                format!("Failed to read credentials file {}: {}", path.display(), e),
                "Check GOOGLE_APPLICATION_CREDENTIALS points to a readable file",
            )
        })?;
        let parsed: CredentialsFile = serde_json::from_str(&content).map_err(|e| {
            AgentError::credentials(
                format!("Unsupported credentials file {}: {}", path.display(), e),
                "Use a service-account key or run `gcloud auth application-default login`",
            )
        })?;
        Ok(match parsed {
            CredentialsFile::ServiceAccount(key) => Self::ServiceAccount(key),
            CredentialsFile::AuthorizedUser(user) => Self::AuthorizedUser(user),
        })
    }

    /// Application default credentials, in the order Google's client libraries use.
    pub fn application_default() -> AgentResult<Self> {
        if let Some(path) = std::env::var_os(CREDENTIALS_FILE_ENV) {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "Using credentials from {}", CREDENTIALS_FILE_ENV);
            return Self::from_file(&path);
        }

        if let Some(path) = well_known_credentials_file().filter(|p| p.is_file()) {
            info!(path = %path.display(), "Using gcloud application default credentials");
            return Self::from_file(&path);
        }

        info!("No credentials file found, using the metadata server");
        Ok(Self::MetadataServer {
            base_url: metadata_base_url()?,
        })
    }

    /// Project associated with the credentials, if they name one.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::ServiceAccount(key) => key.project_id.as_deref(),
            Self::AuthorizedUser(user) => user.quota_project_id.as_deref(),
            Self::MetadataServer { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service_account",
            Self::AuthorizedUser(_) => "authorized_user",
            Self::MetadataServer { .. } => "metadata_server",
        }
    }

    /// Obtain a fresh access token.
    pub async fn fetch_token(&self, http: &reqwest::Client) -> AgentResult<AccessToken> {
        debug!(source = self.kind(), "Fetching access token");
        let response = match self {
            Self::ServiceAccount(key) => {
                let assertion = sign_jwt(key)?;
                http.post(&key.token_uri)
                    .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
                    .send()
                    .await?
            }
            Self::AuthorizedUser(user) => {
                http.post(&user.token_uri)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", user.client_id.as_str()),
                        ("client_secret", user.client_secret.as_str()),
                        ("refresh_token", user.refresh_token.as_str()),
                    ])
                    .send()
                    .await?
            }
            Self::MetadataServer { base_url } => {
                let url = join_url(base_url, "instance/service-accounts/default/token")?;
                http.get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::credentials(
                format!("Token request failed ({}): {}", status, body.trim()),
                "Check that the credentials are valid and have not been revoked",
            ));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
        ))
    }

    /// Ask the metadata server which project this workload runs in.
    pub async fn metadata_project_id(&self, http: &reqwest::Client) -> AgentResult<Option<String>> {
        let Self::MetadataServer { base_url } = self else {
            return Ok(None);
        };
        let url = join_url(base_url, "project/project-id")?;
        let response = http
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let project = response.text().await?.trim().to_string();
        Ok(Some(project).filter(|p| !p.is_empty()))
    }
}

/// Build the signed JWT assertion for a service-account token exchange.
fn sign_jwt(key: &ServiceAccountKey) -> AgentResult<String> {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + JWT_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        AgentError::credentials(
            format!("Invalid service account private key: {}", e),
            "The private_key field must be a PEM-encoded RSA key",
        )
    })?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| AgentError::internal(format!("Failed to sign JWT: {}", e)))
}

fn join_url(base: &Url, path: &str) -> AgentResult<Url> {
    base.join(path)
        .map_err(|e| AgentError::internal(format!("Invalid URL {}{}: {}", base, path, e)))
}

fn metadata_base_url() -> AgentResult<Url> {
    let raw = match std::env::var(METADATA_HOST_ENV) {
        Ok(host) => format!("http://{}/computeMetadata/v1/", host),
        Err(_) => DEFAULT_METADATA_URL.to_string(),
    };
    Url::parse(&raw).map_err(|e| {
        AgentError::credentials(
            format!("Invalid metadata server URL {}: {}", raw, e),
            "Check the GCE_METADATA_HOST environment variable",
        )
    })
}

/// Location of `gcloud auth application-default login` output.
fn well_known_credentials_file() -> Option<PathBuf> {
    #[cfg(windows)]
    let base = dirs::config_dir();
    #[cfg(not(windows))]
    let base = dirs::home_dir().map(|home| home.join(".config"));

    base.map(|dir| {
        dir.join("gcloud")
            .join("application_default_credentials.json")
    })
}
