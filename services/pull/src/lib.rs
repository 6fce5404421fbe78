//! Federation Pull Service
//!
//! Periodically reconciles external federation catalogs into the central
//! dataset gateway, and exposes a small operator API for probing federation
//! definitions and managing their secrets.
//!
//! # Architecture
//!
//! The service has two long-running components:
//! - **Pull loop**: a tokio interval ticker that runs the reconciliation
//!   pipeline once per tick. Ticks never overlap; each run completes before
//!   the next begins.
//! - **Operator API**: axum server with health, federation probe, and secret
//!   management endpoints.
//!
//! # Data Flow
//!
//! Each pull run:
//! 1. Lists enabled federations from the gateway
//! 2. Resolves each federation's credential from the secret store
//! 3. Fetches and schema-validates the federation's catalog list
//! 4. Diffs the catalog against the gateway's existing records
//! 5. Applies the minimal create/update/delete set back to the gateway
//!
//! Failures are isolated per federation and per dataset; a bad federation or
//! a bad item never aborts the rest of the run.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod handlers;
pub mod pipeline;
pub mod server;

use fedsync::{
    AuditSink, CatalogClient, FederationProbe, FedsyncError, HttpSecretStore, LogAuditSink,
    NoopAuditSink, RegistryClient, RegistryConfig, SchemaValidator, SecretStore,
};
use pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_INTERVAL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ORIGIN_TAG: &str = "FEDSYNC";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync error: {0}")]
    Fedsync(#[from] FedsyncError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Service configuration
#[derive(Clone)]
pub struct Config {
    /// Port for the operator API
    pub port: u16,
    /// Seconds between pull runs
    pub interval_secs: u64,
    /// Gateway REST API base URL
    pub gateway_url: String,
    /// Gateway login endpoint URL
    pub gateway_auth_url: String,
    /// Secret store base URL
    pub secret_store_url: String,
    /// Service account email for gateway login
    pub service_email: String,
    /// Service account password for gateway login
    pub service_password: String,
    /// Gateway user id recorded on dataset writes
    pub gateway_user_id: String,
    /// Timeout for all upstream HTTP requests, in seconds
    pub timeout_secs: u64,
    /// Emit gateway audit records
    pub audit_enabled: bool,
    /// Disable a federation in the gateway after a failed sync
    pub invalidate_on_error: bool,
    /// Origin tag scoping which gateway records this service owns
    pub origin_tag: String,
    /// Optional URL of a catalog schema overriding the embedded default
    pub schema_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ServiceError> {
        let port = std::env::var("PULL_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let interval_secs = std::env::var("PULL_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_INTERVAL_SECS);

        let gateway_url = std::env::var("GATEWAY_API_URL")
            .map_err(|_| ServiceError::Config("GATEWAY_API_URL is required".to_string()))?;

        let gateway_auth_url = std::env::var("GATEWAY_API_AUTH_URL")
            .map_err(|_| ServiceError::Config("GATEWAY_API_AUTH_URL is required".to_string()))?;

        let secret_store_url = std::env::var("SECRET_STORE_URL")
            .map_err(|_| ServiceError::Config("SECRET_STORE_URL is required".to_string()))?;

        let service_email = std::env::var("SERVICE_EMAIL")
            .map_err(|_| ServiceError::Config("SERVICE_EMAIL is required".to_string()))?;

        let service_password = std::env::var("SERVICE_PASSWORD")
            .map_err(|_| ServiceError::Config("SERVICE_PASSWORD is required".to_string()))?;

        let gateway_user_id = std::env::var("GATEWAY_API_USER_ID")
            .map_err(|_| ServiceError::Config("GATEWAY_API_USER_ID is required".to_string()))?;

        let timeout_env = std::env::var("DEFAULT_TIMEOUT_SECONDS").ok();
        if let Some(raw) = timeout_env.as_deref() {
            if raw.trim().parse::<u64>().ok().filter(|&n| n > 0).is_none() {
                warn!(
                    "Invalid DEFAULT_TIMEOUT_SECONDS {:?}, using {}s",
                    raw, DEFAULT_TIMEOUT_SECS
                );
            }
        }
        let timeout_secs = parse_timeout(timeout_env.as_deref());

        let audit_enabled = parse_flag(std::env::var("AUDIT_ENABLED").ok().as_deref());
        let invalidate_on_error =
            parse_flag(std::env::var("MARK_DISABLED_ON_ERROR").ok().as_deref());

        let origin_tag = std::env::var("CREATE_ORIGIN_TAG")
            .unwrap_or_else(|_| DEFAULT_ORIGIN_TAG.to_string());

        let schema_url = std::env::var("SCHEMA_VALIDATION_URL").ok();

        Ok(Self {
            port,
            interval_secs,
            gateway_url,
            gateway_auth_url,
            secret_store_url,
            service_email,
            service_password,
            gateway_user_id,
            timeout_secs,
            audit_enabled,
            invalidate_on_error,
            origin_tag,
            schema_url,
        })
    }
}

/// Parse a timeout in seconds. Unset, unparseable, or non-positive values
/// fall back to the 10 second default.
fn parse_timeout(value: Option<&str>) -> u64 {
    value
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Feature flags are numeric: on only when the variable parses as exactly
/// `1`. Unset, unparseable, or any other value means off.
fn parse_flag(value: Option<&str>) -> bool {
    value
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n == 1)
        .unwrap_or(false)
}

/// Run the pull service
pub async fn run(config: Config) -> Result<(), ServiceError> {
    info!("Starting federation pull service");
    info!("Gateway URL: {}", config.gateway_url);
    info!("Secret store URL: {}", config.secret_store_url);
    info!("Pull interval: {}s", config.interval_secs);
    info!("Request timeout: {}s", config.timeout_secs);
    info!("Origin tag: {}", config.origin_tag);
    info!("Audit enabled: {}", config.audit_enabled);
    info!("Invalidate on error: {}", config.invalidate_on_error);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let validator = match config.schema_url.as_deref() {
        Some(url) => {
            info!("Fetching catalog schema from {}", url);
            SchemaValidator::from_url(&client, url).await?
        }
        None => SchemaValidator::default_catalog()?,
    };
    let validator = Arc::new(validator);

    let audit: Arc<dyn AuditSink> = if config.audit_enabled {
        Arc::new(LogAuditSink)
    } else {
        Arc::new(NoopAuditSink)
    };

    let registry = Arc::new(RegistryClient::new(
        client.clone(),
        RegistryConfig {
            base_url: config.gateway_url.clone(),
            auth_url: config.gateway_auth_url.clone(),
            service_email: config.service_email.clone(),
            service_password: config.service_password.clone(),
            user_id: config.gateway_user_id.clone(),
            origin_tag: config.origin_tag.clone(),
            invalidate_on_error: config.invalidate_on_error,
        },
        audit.clone(),
    ));

    let secrets: Arc<dyn SecretStore> =
        Arc::new(HttpSecretStore::new(client.clone(), &config.secret_store_url));

    let catalog = Arc::new(CatalogClient::new(
        client.clone(),
        validator.clone(),
        audit.clone(),
    ));

    let pipeline = Pipeline::new(registry, catalog, secrets.clone(), audit);

    // Pull loop in the background; each tick awaits a full run
    let interval = Duration::from_secs(config.interval_secs);
    let pull_handle = tokio::spawn(async move {
        pipeline::run_pull_loop(pipeline, interval).await;
    });

    // Operator API in the foreground
    let state = Arc::new(handlers::AppState {
        probe: FederationProbe::new(client, validator),
        secrets,
    });
    let server_result = server::run(config.port, state).await;

    // If the server ends, stop pulling
    pull_handle.abort();

    server_result
}
