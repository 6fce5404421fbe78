//! Secret store client
//!
//! HTTP client for the secret backend, implementing the SecretStore trait.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::FedsyncError;

/// Trait for the secret backend holding per-federation credentials.
///
/// `fetch_latest` is the pipeline's read path; the remaining operations
/// back the operator surface that manages federation secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the latest version of a secret's payload by name.
    async fn fetch_latest(&self, name: &str) -> Result<String, FedsyncError>;

    /// Create a secret and store its first version, returning the backend's
    /// reference for the new secret.
    async fn create_secret(&self, secret_id: &str, payload: &str)
    -> Result<String, FedsyncError>;

    /// Add a new version to an existing secret.
    async fn update_secret(&self, secret_id: &str, payload: &str)
    -> Result<String, FedsyncError>;

    /// Delete a secret and all its versions.
    async fn delete_secret(&self, secret_id: &str) -> Result<(), FedsyncError>;
}

// ==================== Secret Store API Types ====================

#[derive(Debug, Serialize, Deserialize)]
struct SecretVersionResponse {
    payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreSecretRequest {
    payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretResponse {
    name: String,
}

// ==================== Secret Store Client ====================

/// HTTP client for the secret backend.
pub struct HttpSecretStore {
    client: Client,
    base_url: String,
}

impl HttpSecretStore {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn fetch_latest(&self, name: &str) -> Result<String, FedsyncError> {
        let url = format!("{}/api/secrets/{}/versions/latest", self.base_url, name);

        let response = self.client.get(&url).send().await.map_err(|e| {
            FedsyncError::SecretBackendUnavailable(format!("secret store request failed: {}", e))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FedsyncError::SecretNotFound(name.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FedsyncError::SecretBackendUnavailable(format!(
                "secret store returned HTTP {}: {}",
                status, text
            )));
        }

        let version: SecretVersionResponse = response.json().await.map_err(|e| {
            FedsyncError::SecretBackendUnavailable(format!("failed to parse response: {}", e))
        })?;

        Ok(version.payload)
    }

    async fn create_secret(
        &self,
        secret_id: &str,
        payload: &str,
    ) -> Result<String, FedsyncError> {
        let url = format!("{}/api/secrets/{}", self.base_url, secret_id);

        let request = StoreSecretRequest {
            payload: payload.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                FedsyncError::SecretBackendUnavailable(format!(
                    "secret store request failed: {}",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FedsyncError::SecretBackendUnavailable(format!(
                "secret store returned HTTP {}: {}",
                status, text
            )));
        }

        let created: SecretResponse = response.json().await.map_err(|e| {
            FedsyncError::SecretBackendUnavailable(format!("failed to parse response: {}", e))
        })?;

        Ok(created.name)
    }

    async fn update_secret(
        &self,
        secret_id: &str,
        payload: &str,
    ) -> Result<String, FedsyncError> {
        let url = format!("{}/api/secrets/{}", self.base_url, secret_id);

        let request = StoreSecretRequest {
            payload: payload.to_string(),
        };

        let response = self
            .client
            .put(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                FedsyncError::SecretBackendUnavailable(format!(
                    "secret store request failed: {}",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FedsyncError::SecretBackendUnavailable(format!(
                "secret store returned HTTP {}: {}",
                status, text
            )));
        }

        let updated: SecretResponse = response.json().await.map_err(|e| {
            FedsyncError::SecretBackendUnavailable(format!("failed to parse response: {}", e))
        })?;

        Ok(updated.name)
    }

    async fn delete_secret(&self, secret_id: &str) -> Result<(), FedsyncError> {
        let url = format!("{}/api/secrets/{}", self.base_url, secret_id);

        let response = self.client.delete(&url).send().await.map_err(|e| {
            FedsyncError::SecretBackendUnavailable(format!("secret store request failed: {}", e))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FedsyncError::SecretNotFound(secret_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FedsyncError::SecretBackendUnavailable(format!(
                "secret store returned HTTP {}: {}",
                status, text
            )));
        }

        Ok(())
    }
}
