//! Gateway registry client
//!
//! Client for the central dataset registry: federation listing, the
//! existing-dataset baseline, dataset writes, and federation invalidation.
//! Every call carries a bearer token obtained through the service-account
//! login exchange; the token is cached for the client's lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use crate::audit::AuditSink;
use crate::error::FedsyncError;
use crate::types::{DatasetVersions, Federation};

/// Status stamped on every dataset record the pipeline writes.
const DATASET_STATUS_ACTIVE: &str = "ACTIVE";

/// Connection and identity settings for the gateway.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the gateway REST API.
    pub base_url: String,
    /// URL of the service-account login endpoint.
    pub auth_url: String,
    pub service_email: String,
    pub service_password: String,
    /// User id stamped on dataset writes.
    pub user_id: String,
    /// `create_origin` tag scoping this subsystem's records.
    pub origin_tag: String,
    /// When false, `invalidate_federation` is a no-op that reports success.
    pub invalidate_on_error: bool,
}

// ==================== Gateway API Types ====================

#[derive(Debug, Serialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct UpsertDatasetRequest {
    team_id: String,
    user_id: String,
    /// The full remote document, serialized; the gateway stores it verbatim.
    metadata: String,
    create_origin: String,
    status: String,
    pid: String,
}

#[derive(Debug, Serialize)]
struct DeleteDatasetRequest {
    team_id: String,
}

// ==================== Registry Client ====================

/// Client for the gateway registry service.
pub struct RegistryClient {
    client: Client,
    config: RegistryConfig,
    audit: Arc<dyn AuditSink>,
    token: RwLock<Option<String>>,
}

impl RegistryClient {
    pub fn new(client: Client, config: RegistryConfig, audit: Arc<dyn AuditSink>) -> Self {
        let config = RegistryConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Self {
            client,
            config,
            audit,
            token: RwLock::new(None),
        }
    }

    pub fn origin_tag(&self) -> &str {
        &self.config.origin_tag
    }

    /// The cached gateway bearer token, logging in on first use.
    async fn service_token(&self) -> Result<String, FedsyncError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut cached = self.token.write().await;
        // Another caller may have logged in while we waited for the lock
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let request = LoginRequest {
            email: self.config.service_email.clone(),
            password: self.config.service_password.clone(),
        };

        let response = self
            .client
            .post(&self.config.auth_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| FedsyncError::Decode(format!("login response: {}", e)))?;

        *cached = Some(login.access_token.clone());
        Ok(login.access_token)
    }

    /// Federations flagged enabled, the unit of work for one pipeline run.
    pub async fn list_active_federations(&self) -> Result<Vec<Federation>, FedsyncError> {
        let token = self.service_token().await?;
        let url = format!("{}/federations", self.config.base_url);

        let response = match self.client.get(&url).bearer_auth(&token).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("unable to pull federations from gateway: {}", err),
                        "GET",
                        "list_federations",
                    )
                    .await;
                return Err(err);
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            self.audit
                .record(
                    &format!("gateway returned HTTP {}: {}", status, text),
                    "GET",
                    "list_federations",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        let federations: Vec<Federation> = response
            .json()
            .await
            .map_err(|e| FedsyncError::Decode(format!("federation list: {}", e)))?;

        Ok(federations.into_iter().filter(|f| f.enabled).collect())
    }

    /// The registry's PID → version-history view for one team, scoped to
    /// this subsystem's origin tag. An empty map is a valid baseline.
    pub async fn fetch_existing_datasets(
        &self,
        team_id: i64,
    ) -> Result<HashMap<String, DatasetVersions>, FedsyncError> {
        let token = self.service_token().await?;
        let url = format!(
            "{}/datasets?team_id={}&create_origin={}&onlyDatasets=true",
            self.config.base_url, team_id, self.config.origin_tag
        );

        let response = match self.client.get(&url).bearer_auth(&token).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("unable to pull team datasets from gateway: {}", err),
                        "GET",
                        "fetch_existing_datasets",
                    )
                    .await;
                return Err(err);
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            self.audit
                .record(
                    &format!("gateway returned HTTP {}: {}", status, text),
                    "GET",
                    "fetch_existing_datasets",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        let datasets: HashMap<String, DatasetVersions> = response
            .json()
            .await
            .map_err(|e| FedsyncError::Decode(format!("team datasets: {}", e)))?;

        Ok(datasets)
    }

    /// Create or update one dataset record.
    ///
    /// The remote document rides in the body as a serialized string, tagged
    /// with this subsystem's origin and an `ACTIVE` status.
    pub async fn upsert_dataset(
        &self,
        team_id: i64,
        pid: &str,
        metadata: &Value,
        is_update: bool,
    ) -> Result<(), FedsyncError> {
        let token = self.service_token().await?;
        let body = UpsertDatasetRequest {
            team_id: team_id.to_string(),
            user_id: self.config.user_id.clone(),
            metadata: metadata.to_string(),
            create_origin: self.config.origin_tag.clone(),
            status: DATASET_STATUS_ACTIVE.to_string(),
            pid: pid.to_string(),
        };

        let (action, request) = if is_update {
            let url = format!("{}/federations/update/{}", self.config.base_url, pid);
            ("PUT", self.client.put(&url))
        } else {
            let url = format!("{}/federations", self.config.base_url);
            ("POST", self.client.post(&url))
        };

        let response = match request.bearer_auth(&token).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("unable to store dataset {}: {}", pid, err),
                        action,
                        "upsert_dataset",
                    )
                    .await;
                return Err(err);
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            self.audit
                .record(
                    &format!("gateway rejected dataset {} (HTTP {}): {}", pid, status, text),
                    action,
                    "upsert_dataset",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        debug!(%pid, is_update, "dataset stored");
        Ok(())
    }

    /// Remove one dataset record no longer present upstream.
    pub async fn delete_dataset(&self, team_id: i64, pid: &str) -> Result<(), FedsyncError> {
        let token = self.service_token().await?;
        let url = format!("{}/federations/delete/{}", self.config.base_url, pid);
        let body = DeleteDatasetRequest {
            team_id: team_id.to_string(),
        };

        let response = match self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("unable to delete dataset {}: {}", pid, err),
                        "DELETE",
                        "delete_dataset",
                    )
                    .await;
                return Err(err);
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            self.audit
                .record(
                    &format!(
                        "gateway rejected dataset delete {} (HTTP {}): {}",
                        pid, status, text
                    ),
                    "DELETE",
                    "delete_dataset",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        debug!(%pid, "dataset deleted");
        Ok(())
    }

    /// Disable and un-test a federation after a failed sync.
    ///
    /// Best-effort operator signal, gated by configuration: when the gate is
    /// off this returns success without touching the gateway, so callers
    /// must never depend on it for correctness.
    pub async fn invalidate_federation(&self, federation_id: i64) -> Result<(), FedsyncError> {
        if !self.config.invalidate_on_error {
            debug!(
                federation_id,
                "federation invalidation disabled by configuration"
            );
            return Ok(());
        }

        let token = self.service_token().await?;
        let url = format!("{}/federations/{}", self.config.base_url, federation_id);

        let response = match self
            .client
            .patch(&url)
            .bearer_auth(&token)
            .json(&json!({"enabled": 0, "tested": 0}))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("unable to invalidate federation {}: {}", federation_id, err),
                        "PATCH",
                        "invalidate_federation",
                    )
                    .await;
                return Err(err);
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            self.audit
                .record(
                    &format!(
                        "gateway rejected invalidation of federation {} (HTTP {}): {}",
                        federation_id, status, text
                    ),
                    "PATCH",
                    "invalidate_federation",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        Ok(())
    }
}
