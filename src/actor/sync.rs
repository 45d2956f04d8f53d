//! Sync Actor - periodic remote → local reconciliation
//!
//! Runs one `ReconciliationEngine` cycle per tick. Shutdown stops the timer;
//! a cycle already in flight runs to completion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::messages::{ChangeOrigin, WsMsg};
use crate::core::Shutdown;
use crate::error::{DevError, ErrorKind};
use crate::sync::{CycleReport, ReconciliationEngine, SyncError};

/// Default delay between two cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Sync Actor - owns the reconciliation timer for one root
pub struct SyncActor {
    engine: Arc<ReconciliationEngine>,
    interval: Duration,
    ws_tx: mpsc::Sender<WsMsg>,
    shutdown: Shutdown,
}

impl SyncActor {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        interval: Duration,
        ws_tx: mpsc::Sender<WsMsg>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            engine,
            interval,
            ws_tx,
            shutdown,
        }
    }

    /// Poll until shutdown. Only a fatal session error ends the loop early.
    pub async fn run(self) -> Result<(), DevError> {
        // Cycles diff against the snapshot, so nothing runs until one exists
        let mut primed = false;

        loop {
            let outcome = if primed {
                self.engine.run_cycle().await
            } else {
                self.engine.prime().await.map(|prime| {
                    crate::debug!("sync"; "snapshot primed with {} remote files", prime.remote_files);
                    for key in &prime.diverged {
                        crate::log!("warning"; "{} differs from the remote, keeping local", key);
                    }
                    primed = true;
                    prime.applied
                })
            };

            match outcome {
                Ok(report) => self.on_report(report).await,
                Err(e) => self.on_error(e)?,
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        crate::debug!("sync"; "polling stopped");
        Ok(())
    }

    async fn on_report(&self, report: CycleReport) {
        if report.is_empty() {
            return;
        }

        for key in &report.pulled {
            crate::log!("sync"; "pulled {}", key);
        }
        for key in &report.deleted {
            crate::log!("sync"; "deleted {}", key);
        }

        let msg = WsMsg::FilesChanged {
            keys: report.changed_keys(),
            origin: ChangeOrigin::Remote,
        };
        if self.ws_tx.send(msg).await.is_err() {
            crate::debug!("sync"; "broadcaster gone, dropping update");
        }
    }

    fn on_error(&self, err: SyncError) -> Result<(), DevError> {
        let err = DevError::from(err);
        match err.kind() {
            ErrorKind::TransientNetwork => crate::debug!("sync"; "{}, retrying next tick", err),
            ErrorKind::Conflict => crate::logger::status_error("sync conflict", &err.to_string()),
            ErrorKind::Validation => crate::logger::status_error("sync failed", &err.to_string()),
            ErrorKind::Authentication => crate::log!("sync"; "{}", err),
            ErrorKind::FatalSession => return Err(err),
        }
        Ok(())
    }
}
