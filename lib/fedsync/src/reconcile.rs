//! Reconciliation engine
//!
//! Pure diff between a federation's remote catalog and the registry's
//! existing state for that origin. No I/O happens here; the plan is
//! recomputed from scratch every run and never stored.

use std::collections::{HashMap, HashSet};

use crate::types::{CatalogItem, DatasetVersions};

/// What to do with one PID this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Update,
    Skip,
    Delete,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Skip => "SKIP",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub pid: String,
    pub decision: Decision,
}

/// Compute the minimal set of actions to make the registry mirror the
/// remote catalog.
///
/// Deletes come first (PIDs known to the registry but gone upstream,
/// sorted for determinism), then one decision per remote entry in list
/// order. A PID repeated in the remote list is decided once, at its first
/// occurrence.
///
/// Version comparison is exact string membership against the PID's
/// registry version history, not an ordering: a federation that reissues a
/// previously-seen version string is indistinguishable from "unchanged".
/// That matches the registry's contract and is deliberate.
pub fn plan(
    remote: &[CatalogItem],
    existing: &HashMap<String, DatasetVersions>,
) -> Vec<PlannedAction> {
    let remote_pids: HashSet<&str> = remote.iter().map(|i| i.persistent_id.as_str()).collect();

    let mut actions = Vec::with_capacity(existing.len() + remote.len());

    let mut missing: Vec<&String> = existing
        .keys()
        .filter(|pid| !remote_pids.contains(pid.as_str()))
        .collect();
    missing.sort();

    for pid in missing {
        actions.push(PlannedAction {
            pid: pid.clone(),
            decision: Decision::Delete,
        });
    }

    let mut seen = HashSet::new();
    for item in remote {
        if !seen.insert(item.persistent_id.as_str()) {
            continue;
        }

        let decision = match existing.get(&item.persistent_id) {
            None => Decision::Create,
            Some(dataset) if dataset.versions.contains(&item.version) => Decision::Skip,
            Some(_) => Decision::Update,
        };

        actions.push(PlannedAction {
            pid: item.persistent_id.clone(),
            decision,
        });
    }

    actions
}
