//! Gateway audit records
//!
//! Failure paths across the pipeline emit audit records through a sink
//! trait. The transport that forwards them to the gateway's audit topic is
//! external; the in-repo sink writes them as structured log events.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Service tag stamped on every audit record.
pub const AUDIT_SERVICE: &str = "fedsync";

/// Sentinel id marking records produced by the service itself rather than a
/// user or team action.
pub const AUDIT_SERVICE_ID: i64 = -99;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: i64,
    pub team_id: i64,
    pub description: String,
    pub action_type: String,
    pub action_service: String,
    pub action_name: String,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
}

impl AuditRecord {
    pub fn new(description: &str, action_type: &str, action_name: &str) -> Self {
        Self {
            user_id: AUDIT_SERVICE_ID,
            team_id: AUDIT_SERVICE_ID,
            description: description.to_string(),
            action_type: action_type.to_string(),
            action_service: AUDIT_SERVICE.to_string(),
            action_name: action_name.to_string(),
            created_at: now_millis(),
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Destination for audit records.
///
/// Recording is fire-and-forget: implementations swallow their own failures
/// after logging them, so no caller ever branches on an audit outcome.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, description: &str, action_type: &str, action_name: &str);
}

/// Sink that emits audit records as structured log events under the
/// `audit` target.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, description: &str, action_type: &str, action_name: &str) {
        let record = AuditRecord::new(description, action_type, action_name);
        match serde_json::to_string(&record) {
            Ok(payload) => info!(target: "audit", %payload, "gateway audit record"),
            Err(e) => warn!("failed to serialize audit record: {}", e),
        }
    }
}

/// Sink installed when auditing is disabled by configuration.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _description: &str, _action_type: &str, _action_name: &str) {}
}
