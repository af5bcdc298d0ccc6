//! PyPI Downloads MCP Server - Main entry point.
//!
//! This server exposes a single MCP tool that answers questions about Python
//! package downloads by querying the public PyPI dataset on BigQuery.

use pypi_downloads_mcp::config::{Config, DeploymentEnvironment, TransportMode};
use pypi_downloads_mcp::tools::ToolSettings;
use pypi_downloads_mcp::transport::{HttpTransport, StdioTransport, Transport};
use pypi_downloads_mcp::warehouse::CredentialSource;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Output goes to stderr: with the stdio transport stdout carries the protocol.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    init_tracing(&config);

    let environment = DeploymentEnvironment::detect();
    let transport_mode = config.resolved_transport(environment);

    info!(
        environment = %environment,
        transport = %transport_mode,
        "Starting PyPI Downloads MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Resolve credentials up front so a bad key fails at startup, not per call
    let credentials = match CredentialSource::resolve(config.service_account_content.as_deref()) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!(error = %e, suggestion = e.suggestion().unwrap_or_default(), "Credential resolution failed");
            return Err(e.into());
        }
    };
    info!(
        source = credentials.kind(),
        project = config.project.as_deref().or(credentials.project_id()).unwrap_or("<auto>"),
        "Credentials resolved"
    );

    let settings = Arc::new(ToolSettings::from_config(&config, environment, credentials));

    let result = match transport_mode {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(settings).run().await
        }
        TransportMode::Http => {
            let host = config.resolved_http_host(environment);
            info!(
                host = %host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(settings, host, config.http_port, &config.mcp_endpoint)
                .run()
                .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
