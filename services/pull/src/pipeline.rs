//! Reconciliation pipeline driver.
//!
//! One run walks every enabled federation: resolve its credential, fetch and
//! validate its catalog list, diff the list against the gateway's existing
//! records, then apply the minimal create/update/delete set.
//!
//! # Failure isolation
//!
//! - A federation that fails credential resolution, list fetch, or baseline
//!   fetch is skipped; the run continues with the next federation.
//! - A non-2xx from the federation's list endpoint additionally submits the
//!   federation for invalidation, once per run.
//! - A failed item fetch skips that item only (no record is ever written
//!   without its document) and submits the owning federation for
//!   invalidation.
//! - Gateway write failures are logged and counted; they abort nothing.

use fedsync::{
    AuditSink, AuthMethod, CatalogClient, Decision, Federation, FedsyncError, RegistryClient,
    SecretStore, plan, resolve_credential,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Counters for one pipeline run, logged at completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Enabled federations returned by the gateway
    pub federations: usize,
    /// Federations processed to the end of their item loop
    pub synced: usize,
    /// Federations skipped before their item loop
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Skip decisions (version already known to the gateway)
    pub unchanged: usize,
    /// Item fetches that failed and were skipped
    pub item_failures: usize,
    /// Gateway upserts/deletes that failed
    pub write_failures: usize,
}

/// Owns the clients a run needs. One instance serves the life of the
/// service; all per-run state is local to `run_once`.
pub struct Pipeline {
    registry: Arc<RegistryClient>,
    catalog: Arc<CatalogClient>,
    secrets: Arc<dyn SecretStore>,
    audit: Arc<dyn AuditSink>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<RegistryClient>,
        catalog: Arc<CatalogClient>,
        secrets: Arc<dyn SecretStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            catalog,
            secrets,
            audit,
        }
    }

    /// Execute one full reconciliation run.
    ///
    /// Never returns an error: every failure is converted into a skip and a
    /// counter. A failed federation listing yields an empty run.
    pub async fn run_once(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        self.audit
            .record("running the pull service", "RUN", "run_once")
            .await;

        let federations = match self.registry.list_active_federations().await {
            Ok(federations) => federations,
            Err(e) => {
                error!("Unable to list federations: {}", e);
                return summary;
            }
        };
        summary.federations = federations.len();

        info!("Collected {} federation(s)", federations.len());
        self.audit
            .record(
                &format!("collected {} federations", federations.len()),
                "RUN",
                "run_once",
            )
            .await;

        for federation in &federations {
            match self.sync_federation(federation, &mut summary).await {
                Ok(()) => summary.synced += 1,
                Err(e) => {
                    summary.skipped += 1;
                    warn!(
                        federation_id = federation.id,
                        "Skipping federation: {}", e
                    );
                }
            }
        }

        info!(
            federations = summary.federations,
            synced = summary.synced,
            skipped = summary.skipped,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            item_failures = summary.item_failures,
            write_failures = summary.write_failures,
            "Pull run complete"
        );

        summary
    }

    /// Sync one federation's catalog into the gateway.
    ///
    /// Errors returned here mean the federation was skipped before any
    /// decisions were applied; failures inside the item loop are absorbed
    /// into the summary instead.
    async fn sync_federation(
        &self,
        federation: &Federation,
        summary: &mut RunSummary,
    ) -> Result<(), FedsyncError> {
        let Some(team_id) = federation.team_id() else {
            let msg = format!("federation {} has no team", federation.id);
            self.audit.record(&msg, "RUN", "sync_federation").await;
            return Err(FedsyncError::Decode(msg));
        };

        let method: AuthMethod = match federation.auth_type.parse() {
            Ok(method) => method,
            Err(e) => {
                self.audit
                    .record(
                        &format!("federation {}: {}", federation.id, e),
                        "RUN",
                        "sync_federation",
                    )
                    .await;
                return Err(e);
            }
        };

        let credential = match resolve_credential(
            self.secrets.as_ref(),
            method,
            &federation.auth_secret_key,
        )
        .await
        {
            Ok(credential) => credential,
            Err(e) => {
                self.audit
                    .record(
                        &format!("unable to retrieve federation secret: {}", e),
                        "RUN",
                        "sync_federation",
                    )
                    .await;
                return Err(e);
            }
        };

        let list = match self.catalog.fetch_list(federation, &credential).await {
            Ok(list) => list,
            Err(e) => {
                if matches!(e, FedsyncError::UpstreamRejected(..)) {
                    self.invalidate(federation.id).await;
                }
                return Err(e);
            }
        };
        info!(
            federation_id = federation.id,
            datasets = list.items.len(),
            "Fetched catalog list"
        );

        let existing = self.registry.fetch_existing_datasets(team_id).await?;
        let actions = plan(&list.items, &existing);

        for action in &actions {
            match action.decision {
                Decision::Skip => {
                    debug!(
                        federation_id = federation.id,
                        pid = %action.pid,
                        "Version already in gateway, skipping"
                    );
                    summary.unchanged += 1;
                }
                Decision::Delete => {
                    match self.registry.delete_dataset(team_id, &action.pid).await {
                        Ok(()) => summary.deleted += 1,
                        Err(e) => {
                            summary.write_failures += 1;
                            warn!(
                                federation_id = federation.id,
                                pid = %action.pid,
                                "Delete failed: {}", e
                            );
                        }
                    }
                }
                Decision::Create | Decision::Update => {
                    let metadata = match self
                        .catalog
                        .fetch_item(federation, &credential, &action.pid)
                        .await
                    {
                        Ok(metadata) => metadata,
                        Err(e) => {
                            summary.item_failures += 1;
                            warn!(
                                federation_id = federation.id,
                                pid = %action.pid,
                                "Item fetch failed, skipping: {}", e
                            );
                            self.invalidate(federation.id).await;
                            continue;
                        }
                    };

                    let is_update = action.decision == Decision::Update;
                    match self
                        .registry
                        .upsert_dataset(team_id, &action.pid, &metadata, is_update)
                        .await
                    {
                        Ok(()) => {
                            if is_update {
                                summary.updated += 1;
                            } else {
                                summary.created += 1;
                            }
                        }
                        Err(e) => {
                            summary.write_failures += 1;
                            warn!(
                                federation_id = federation.id,
                                pid = %action.pid,
                                "Upsert failed: {}", e
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Best effort; a failed invalidation never fails the caller.
    async fn invalidate(&self, federation_id: i64) {
        if let Err(e) = self.registry.invalidate_federation(federation_id).await {
            warn!(federation_id, "Unable to invalidate federation: {}", e);
        }
    }
}

/// Run the reconciliation pipeline on a fixed interval.
///
/// Each tick awaits the full run before the next tick is taken, so runs
/// never overlap.
pub async fn run_pull_loop(pipeline: Pipeline, period: Duration) {
    info!("Starting pull loop (interval: {:?})", period);

    let mut ticker = interval(period);

    loop {
        ticker.tick().await;
        pipeline.run_once().await;
    }
}
