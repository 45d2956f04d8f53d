//! `[sync]` and `[watch]` section configuration.
//!
//! ```toml
//! [sync]
//! interval_ms = 3000
//! timeout_ms = 10000
//! no_delete = false
//! initial = "keep"              # or "remote": settle startup diffs
//! only = ["templates/*.json"]     # default: every JSON file
//! ignore = ["config/settings_data.json"]
//!
//! [watch]
//! ignore = ["assets/*.map"]
//! stability_ms = 400
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::asset::PathMatcher;
use crate::config::ConfigDiagnostics;
use crate::sync::{DEFAULT_SCOPE, DeletePolicy, InitialSync, ReconcileOptions};

/// Remote polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    /// Keep local files deleted remotely
    pub no_delete: bool,
    /// Which side wins for JSON files that already differ at startup
    pub initial: InitialSync,
    pub only: Vec<String>,
    pub ignore: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            timeout_ms: 10_000,
            no_delete: false,
            initial: InitialSync::Keep,
            only: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Engine options; `only` replaces the JSON default scope.
    pub fn reconcile_options(&self) -> Result<ReconcileOptions, glob::PatternError> {
        let scope = if self.only.is_empty() {
            PathMatcher::new([DEFAULT_SCOPE], &self.ignore)?
        } else {
            PathMatcher::new(&self.only, &self.ignore)?
        };
        let deletes = if self.no_delete {
            DeletePolicy::Disabled
        } else {
            DeletePolicy::JsonOnly
        };
        Ok(ReconcileOptions {
            scope: scope.with_default_ignores(),
            deletes,
            initial: self.initial,
            timeout: self.timeout(),
        })
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.interval_ms == 0 {
            diag.error("sync.interval_ms", "poll interval must be greater than zero");
        }
        if self.timeout_ms == 0 {
            diag.error("sync.timeout_ms", "timeout must be greater than zero");
        }
        validate_patterns("sync.only", &self.only, diag);
        validate_patterns("sync.ignore", &self.ignore, diag);
    }
}

/// Local watcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub ignore: Vec<String>,
    pub stability_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            stability_ms: crate::actor::fs::STABILITY_MS,
        }
    }
}

impl WatchConfig {
    pub fn stability(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        validate_patterns("watch.ignore", &self.ignore, diag);
    }
}

fn validate_patterns(field: &str, patterns: &[String], diag: &mut ConfigDiagnostics) {
    for (idx, raw) in patterns.iter().enumerate() {
        if let Err(e) = PathMatcher::new([raw], std::iter::empty::<&str>()) {
            diag.error(format!("{field}[{idx}]"), format!("invalid pattern `{raw}`: {e}"));
        }
    }
}
