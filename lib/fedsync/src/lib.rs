//! Fedsync reconciliation library
//!
//! This library provides the types, clients, and reconciliation engine for
//! mirroring federated dataset catalogs into the central registry.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod audit;
pub mod catalog;
pub mod credentials;
pub mod error;
pub mod probe;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod secrets;
pub mod types;

pub use audit::{AuditRecord, AuditSink, LogAuditSink, NoopAuditSink};
pub use catalog::CatalogClient;
pub use credentials::{AuthMethod, SecretPayload, resolve_credential};
pub use error::FedsyncError;
pub use probe::{
    FederationProbe, ProbeDefinition, StatusReport, apply_auth_header, status_report,
};
pub use reconcile::{Decision, PlannedAction, plan};
pub use registry::{RegistryClient, RegistryConfig};
pub use schema::SchemaValidator;
pub use secrets::{HttpSecretStore, SecretStore};
pub use types::{CatalogItem, CatalogList, DatasetVersions, Federation, Team};
