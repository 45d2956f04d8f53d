//! Remote -> local reconciliation.
//!
//! - `remote` - `RemoteStore` trait and the HTTP theme-files client
//! - `snapshot` - last observed remote checksums (atomically replaced)
//! - `reconcile` - the per-cycle diff / conflict / apply engine

mod reconcile;
mod remote;
mod snapshot;

#[cfg(test)]
mod tests;

use std::time::Duration;

use thiserror::Error;

use crate::asset::{AssetError, FileKey};

pub use reconcile::{
    CycleReport, DeletePolicy, InitialSync, PrimeReport, ReconcileOptions, ReconciliationEngine,
};
pub use remote::{
    HttpThemeStore, RemoteAsset, RemoteChecksum, RemoteError, RemoteStore, ThemeTarget,
};
pub use snapshot::{ChecksumSnapshot, SnapshotCell};

/// Default scope of a cycle: JSON files only.
pub const DEFAULT_SCOPE: &str = "**/*.json";

/// Reconciliation cycle failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{}", crate::error::conflict_message(.0))]
    Conflict(Vec<FileKey>),

    #[error(transparent)]
    Asset(#[from] AssetError),
}
