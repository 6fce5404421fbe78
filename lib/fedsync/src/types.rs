//! Wire types for the gateway and federation APIs

use serde::{Deserialize, Serialize};

/// A configured external dataset source, as returned by the gateway.
///
/// Read fresh at the start of every pipeline run. The pipeline only ever
/// mutates a federation indirectly, by asking the gateway to invalidate it
/// after a failed sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Federation {
    pub id: i64,
    pub auth_type: String,
    pub auth_secret_key: String,
    pub endpoint_baseurl: String,
    pub endpoint_datasets: String,
    pub endpoint_dataset: String,
    #[serde(default)]
    pub run_time_hour: u32,
    pub enabled: bool,
    #[serde(default)]
    pub team: Vec<Team>,
}

impl Federation {
    /// The owning team id, taken from the first team entry.
    ///
    /// Federations are configured with exactly one owning team; an empty
    /// list means the record cannot be scoped and the caller must skip it.
    pub fn team_id(&self) -> Option<i64> {
        self.team.first().map(|t| t.id)
    }

    /// Full URL of the catalog list endpoint.
    pub fn list_url(&self) -> String {
        format!("{}{}", self.endpoint_baseurl, self.endpoint_datasets)
    }

    /// Full URL of the per-item endpoint with `{id}` substituted.
    pub fn item_url(&self, pid: &str) -> String {
        format!("{}{}", self.endpoint_baseurl, self.endpoint_dataset).replace("{id}", pid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// A federation's catalog list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogList {
    pub items: Vec<CatalogItem>,
    #[serde(default)]
    pub query: Option<serde_json::Value>,
}

/// One entry in a federation's catalog list.
///
/// `persistent_id` is unique within the federation; `version` is an opaque
/// string compared for equality only, never ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(rename = "@schema", default)]
    pub schema: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "persistentId")]
    pub persistent_id: String,
    #[serde(rename = "self", default)]
    pub self_link: String,
    pub version: String,
    #[serde(default)]
    pub issued: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub source: String,
}

/// Version history of one registry dataset record, keyed by PID in the
/// gateway's `GET /datasets` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetVersions {
    pub versions: Vec<String>,
}
