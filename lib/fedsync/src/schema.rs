//! Catalog list schema validation
//!
//! Every federation list response must validate against the catalog-list
//! JSON Schema before it is decoded. The default schema ships with the
//! crate; deployments can point at a published schema instead.

use reqwest::Client;
use serde_json::Value;

use crate::error::FedsyncError;

const DEFAULT_CATALOG_SCHEMA: &str = include_str!("../assets/catalog.schema.json");

/// A compiled catalog-list schema.
///
/// Compiled once at startup and reused for every list fetch.
#[derive(Debug)]
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Build a validator from the schema bundled with the crate.
    pub fn default_catalog() -> Result<Self, FedsyncError> {
        let schema: Value = serde_json::from_str(DEFAULT_CATALOG_SCHEMA)
            .map_err(|e| FedsyncError::InvalidSchema(e.to_string()))?;
        Self::from_value(&schema)
    }

    /// Build a validator from an already-decoded schema document.
    pub fn from_value(schema: &Value) -> Result<Self, FedsyncError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| FedsyncError::InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Fetch a schema document from `url` and compile it.
    pub async fn from_url(client: &Client, url: &str) -> Result<Self, FedsyncError> {
        let response = client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FedsyncError::UpstreamRejected(status.as_u16(), text));
        }

        let schema: Value = response.json().await?;
        Self::from_value(&schema)
    }

    /// Validate a decoded list body, collecting every violation.
    pub fn validate(&self, instance: &Value) -> Result<(), FedsyncError> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| {
                let pointer = e.instance_path.to_string();
                if pointer.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", pointer, e)
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FedsyncError::SchemaValidation(errors.join("; ")))
        }
    }
}
