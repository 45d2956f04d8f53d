//! Checksum reconciliation between the local store and the remote theme.
//!
//! One cycle:
//!
//! ```text
//! capture local checksums
//!   -> fetch remote checksums (bounded by timeout)
//!   -> filter both sides to the sync scope
//!   -> diff against the prior snapshot (remote-changed / remote-deleted)
//!   -> conflict check against the captured and current local checksums
//!   -> fetch bodies, re-check, then write / delete
//!   -> snapshot := full remote set
//! ```
//!
//! Every conflict check completes before the first write, so a cycle is
//! all-or-nothing. A conflicted cycle leaves the snapshot untouched and the
//! same keys conflict again on the next tick until one side is reverted.
//!
//! A cycle that does not get a body for every key it pulls fails as a
//! transient remote error; the snapshot only advances once every pull landed.
//!
//! Before the first cycle, `prime` settles keys that already differ at
//! session start according to [`InitialSync`].

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use super::SyncError;
use super::remote::{RemoteError, RemoteStore};
use super::snapshot::{ChecksumSnapshot, SnapshotCell};
use crate::asset::{Asset, AssetStore, Checksum, FileKey, PathMatcher};

/// Which remote deletions are mirrored locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Only JSON files (settings, templates, locales) are deleted locally.
    #[default]
    JsonOnly,
    /// Never delete local files (`--no-delete`).
    Disabled,
}

impl DeletePolicy {
    pub fn applies_to(self, key: &FileKey) -> bool {
        match self {
            Self::JsonOnly => key.is_json(),
            Self::Disabled => false,
        }
    }
}

/// How keys that already differ when the session starts are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialSync {
    /// Local files stay as they are; differing keys count as local edits.
    #[default]
    Keep,
    /// The remote wins: differing and remote-only keys are downloaded,
    /// local-only keys deleted under the delete policy.
    Remote,
}

/// Keys written or deleted by one successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pulled: Vec<FileKey>,
    pub deleted: Vec<FileKey>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.pulled.is_empty() && self.deleted.is_empty()
    }

    /// Every key touched, pulled first.
    pub fn changed_keys(&self) -> Vec<FileKey> {
        self.pulled.iter().chain(&self.deleted).cloned().collect()
    }
}

/// Outcome of the startup reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimeReport {
    pub remote_files: usize,
    /// Written or deleted under [`InitialSync::Remote`]
    pub applied: CycleReport,
    /// In-scope keys left differing from the remote under [`InitialSync::Keep`]
    pub diverged: Vec<FileKey>,
}

/// Startup diff of local against remote, restricted to the scope.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct InitialDiff {
    /// Missing locally or holding other content
    pub differing: Vec<FileKey>,
    pub local_only: Vec<FileKey>,
}

pub(super) fn diff_initial(
    remote: &FxHashMap<FileKey, Checksum>,
    local: &FxHashMap<FileKey, Checksum>,
    scope: &PathMatcher,
) -> InitialDiff {
    let mut diff = InitialDiff::default();
    for (key, remote_sum) in remote {
        if scope.is_match(key) && local.get(key) != Some(remote_sum) {
            diff.differing.push(key.clone());
        }
    }
    for key in local.keys() {
        if scope.is_match(key) && !remote.contains_key(key) {
            diff.local_only.push(key.clone());
        }
    }
    diff.differing.sort();
    diff.local_only.sort();
    diff
}

/// Every requested key must come back exactly once, and nothing else.
pub(super) fn check_bodies(requested: &[FileKey], assets: &[Asset]) -> Result<(), RemoteError> {
    let mut pending: FxHashSet<&FileKey> = requested.iter().collect();
    for asset in assets {
        if !pending.remove(&asset.key) {
            return Err(RemoteError::Decode(format!(
                "unexpected body for `{}`",
                asset.key
            )));
        }
    }
    match pending.into_iter().min() {
        Some(key) => Err(RemoteError::Decode(format!("missing body for `{key}`"))),
        None => Ok(()),
    }
}

/// Classification of one cycle, computed before any write.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct CyclePlan {
    pub pull: Vec<FileKey>,
    pub delete: Vec<FileKey>,
    pub conflicts: Vec<FileKey>,
}

/// Inputs to the pure planning step.
pub(super) struct PlanInput<'a> {
    pub prior: &'a ChecksumSnapshot,
    pub remote: &'a FxHashMap<FileKey, Checksum>,
    /// Local checksums captured before the remote fetch started.
    pub local_at_start: &'a FxHashMap<FileKey, Checksum>,
    /// Local checksums right after the fetch.
    pub local_now: &'a FxHashMap<FileKey, Checksum>,
    pub scope: &'a PathMatcher,
    pub deletes: DeletePolicy,
}

/// Classify every in-scope key as unchanged, pull, delete or conflict.
pub(super) fn plan_cycle(input: &PlanInput<'_>) -> CyclePlan {
    let mut plan = CyclePlan::default();

    // A key moved locally if it differs from the last reconciled value or
    // changed while the fetch was in flight.
    let changed_locally = |key: &FileKey| {
        let now = input.local_now.get(key);
        now != input.prior.get(key.as_str()) || now != input.local_at_start.get(key)
    };

    for (key, remote_sum) in input.remote {
        if !input.scope.is_match(key) {
            continue;
        }
        if input.prior.get(key.as_str()) == Some(remote_sum) {
            continue;
        }
        // Already identical locally: nothing to write, nothing to conflict
        if input.local_now.get(key) == Some(remote_sum) {
            continue;
        }
        if changed_locally(key) {
            plan.conflicts.push(key.clone());
        } else {
            plan.pull.push(key.clone());
        }
    }

    for (key, _) in input.prior.iter() {
        if input.remote.contains_key(key) || !input.scope.is_match(key) {
            continue;
        }
        if !input.deletes.applies_to(key) || !input.local_now.contains_key(key) {
            continue;
        }
        if changed_locally(key) {
            plan.conflicts.push(key.clone());
        } else {
            plan.delete.push(key.clone());
        }
    }

    plan.pull.sort();
    plan.delete.sort();
    plan.conflicts.sort();
    plan
}

/// Engine options.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Keys considered by a cycle (default: `**/*.json`).
    pub scope: PathMatcher,
    pub deletes: DeletePolicy,
    pub initial: InitialSync,
    /// Upper bound for each remote call.
    pub timeout: Duration,
}

/// Periodic remote -> local reconciliation for one AssetStore.
pub struct ReconciliationEngine {
    store: Arc<AssetStore>,
    remote: Arc<dyn RemoteStore>,
    snapshot: SnapshotCell,
    options: ReconcileOptions,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<AssetStore>,
        remote: Arc<dyn RemoteStore>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            remote,
            snapshot: SnapshotCell::default(),
            options,
        }
    }

    /// Current snapshot (shared, immutable).
    pub fn snapshot(&self) -> Arc<ChecksumSnapshot> {
        self.snapshot.load()
    }

    /// Reconcile once at session start and seed the snapshot.
    ///
    /// The first cycle then diffs against what the remote held when the
    /// session began.
    pub async fn prime(&self) -> Result<PrimeReport, SyncError> {
        let local_at_start = self.store.checksums();
        let remote = self.fetch_remote().await?;
        let diff = diff_initial(&remote, &local_at_start, &self.options.scope);

        let mut report = PrimeReport {
            remote_files: remote.len(),
            ..PrimeReport::default()
        };
        match self.options.initial {
            InitialSync::Keep => report.diverged = diff.differing,
            InitialSync::Remote => {
                let deletes: Vec<FileKey> = diff
                    .local_only
                    .into_iter()
                    .filter(|key| self.options.deletes.applies_to(key))
                    .collect();
                let incoming = self.fetch_bodies(&diff.differing).await?;
                self.reject_late_edits(diff.differing.iter().chain(&deletes), &local_at_start)?;
                report.applied = self.apply(incoming, deletes)?;
            }
        }

        self.snapshot.replace(remote.into_iter().collect());
        self.clear_converged_overrides();
        Ok(report)
    }

    /// Run one cycle. On conflict nothing is written and the snapshot is kept.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let local_at_start = self.store.checksums();
        let remote = self.fetch_remote().await?;
        let local_now = self.store.checksums();
        let prior = self.snapshot.load();

        let plan = plan_cycle(&PlanInput {
            prior: &prior,
            remote: &remote,
            local_at_start: &local_at_start,
            local_now: &local_now,
            scope: &self.options.scope,
            deletes: self.options.deletes,
        });

        if !plan.conflicts.is_empty() {
            return Err(SyncError::Conflict(plan.conflicts));
        }

        let incoming = self.fetch_bodies(&plan.pull).await?;
        self.reject_late_edits(plan.pull.iter().chain(&plan.delete), &local_now)?;
        let report = self.apply(incoming, plan.delete)?;

        self.snapshot.replace(remote.into_iter().collect());
        self.clear_converged_overrides();
        Ok(report)
    }

    async fn fetch_bodies(&self, keys: &[FileKey]) -> Result<Vec<Asset>, SyncError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let assets = tokio::time::timeout(self.options.timeout, self.remote.fetch_assets(keys))
            .await
            .map_err(|_| SyncError::Timeout(self.options.timeout))??;
        check_bodies(keys, &assets)?;
        Ok(assets)
    }

    /// Fail with a conflict if any key moved locally since `expected` was taken.
    fn reject_late_edits<'a>(
        &self,
        keys: impl Iterator<Item = &'a FileKey>,
        expected: &FxHashMap<FileKey, Checksum>,
    ) -> Result<(), SyncError> {
        let late: Vec<FileKey> = keys
            .filter(|key| self.store.checksum(key.as_str()).as_ref() != expected.get(*key))
            .cloned()
            .collect();
        if late.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Conflict(late))
        }
    }

    fn apply(&self, incoming: Vec<Asset>, deletes: Vec<FileKey>) -> Result<CycleReport, SyncError> {
        let mut report = CycleReport::default();
        for asset in incoming {
            let key = asset.key.clone();
            self.store.write(asset)?;
            self.store.clear_override(key.as_str());
            report.pulled.push(key);
        }
        for key in deletes {
            self.store.delete(&key)?;
            report.deleted.push(key);
        }
        report.pulled.sort();
        Ok(report)
    }

    async fn fetch_remote(&self) -> Result<FxHashMap<FileKey, Checksum>, SyncError> {
        let listed = tokio::time::timeout(self.options.timeout, self.remote.fetch_checksums())
            .await
            .map_err(|_| SyncError::Timeout(self.options.timeout))??;
        Ok(listed.into_iter().map(|c| (c.key, c.checksum)).collect())
    }

    /// Drop the override flag for keys the remote now holds verbatim.
    fn clear_converged_overrides(&self) {
        let snapshot = self.snapshot.load();
        for asset in self.store.overrides() {
            if snapshot.get(asset.key.as_str()) == Some(&asset.checksum) {
                self.store.clear_override(asset.key.as_str());
                crate::debug!("sync"; "override converged: {}", asset.key);
            }
        }
    }
}
