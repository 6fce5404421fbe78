//! Federation catalog client
//!
//! Authenticated access to a federation's list and per-item endpoints.
//! List bodies are schema-validated before decode; item documents are
//! returned as raw JSON for the registry to store verbatim.

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::audit::AuditSink;
use crate::credentials::SecretPayload;
use crate::error::FedsyncError;
use crate::schema::SchemaValidator;
use crate::types::{CatalogList, Federation};

/// Client for a federation's catalog endpoints.
///
/// The `reqwest::Client` is injected so the process-wide timeout applies and
/// tests can point it at a substitutable transport.
pub struct CatalogClient {
    client: Client,
    validator: Arc<SchemaValidator>,
    audit: Arc<dyn AuditSink>,
}

impl CatalogClient {
    pub fn new(client: Client, validator: Arc<SchemaValidator>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            client,
            validator,
            audit,
        }
    }

    /// Fetch and decode a federation's catalog list.
    ///
    /// Non-2xx responses surface as `UpstreamRejected`; the caller decides
    /// whether to invalidate the federation. The body must validate against
    /// the catalog-list schema before it is decoded.
    pub async fn fetch_list(
        &self,
        federation: &Federation,
        credential: &SecretPayload,
    ) -> Result<CatalogList, FedsyncError> {
        let url = federation.list_url();
        debug!(federation_id = federation.id, %url, "fetching catalog list");

        let request = credential.authorize(self.client.get(&url));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("catalog list fetch failed: {}", err),
                        "GET",
                        "fetch_list",
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
                    &format!("catalog list endpoint returned HTTP {}: {}", status, text),
                    "GET",
                    "fetch_list",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        let body = response.text().await.map_err(FedsyncError::from)?;
        let value: Value = serde_json::from_str(&body).map_err(|e| {
            FedsyncError::Decode(format!("catalog list body is not JSON: {}", e))
        })?;

        if let Err(err) = self.validator.validate(&value) {
            self.audit
                .record(
                    &format!("catalog list failed schema validation: {}", err),
                    "GET",
                    "fetch_list",
                )
                .await;
            return Err(err);
        }

        let list: CatalogList = serde_json::from_value(value)
            .map_err(|e| FedsyncError::Decode(format!("catalog list: {}", e)))?;

        Ok(list)
    }

    /// Fetch one dataset document by PID.
    ///
    /// The PID is substituted into the federation's item URL template and
    /// the document is returned undecoded, ready to be written to the
    /// registry as the record's metadata.
    pub async fn fetch_item(
        &self,
        federation: &Federation,
        credential: &SecretPayload,
        pid: &str,
    ) -> Result<Value, FedsyncError> {
        let url = federation.item_url(pid);
        debug!(federation_id = federation.id, %pid, %url, "fetching catalog item");

        let request = credential.authorize(self.client.get(&url));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = FedsyncError::from(e);
                self.audit
                    .record(
                        &format!("catalog item fetch for {} failed: {}", pid, err),
                        "GET",
                        "fetch_item",
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
                        "catalog item endpoint for {} returned HTTP {}: {}",
                        pid, status, text
                    ),
                    "GET",
                    "fetch_item",
                )
                .await;
            return Err(FedsyncError::UpstreamRejected(status, text));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| FedsyncError::Decode(format!("catalog item {}: {}", pid, e)))?;

        Ok(document)
    }
}
