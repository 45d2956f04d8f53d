//! Draft Actor - per-extension build and push loop
//!
//! ```text
//! FsActor --Changed--> DraftActor --build--> artifact --push--> draft endpoint
//!                          |                                  |
//!                          |        <--Unauthorized-- refresh token, retry once
//!                          +--ExtensionsUpdated--> WsActor
//! ```
//!
//! One push at a time per extension. Changes that arrive while a push is
//! running collapse into a single follow-up push.

mod build;
mod http;
mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::messages::{DraftMsg, WsMsg};
use crate::core::Shutdown;
use crate::error::{DevError, ErrorKind};

pub use build::{CommandBuilder, StoreBundler};
pub use http::{HttpDraftClient, TokenCommand};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("draft endpoint unavailable: {0}")]
    Transient(String),

    #[error("draft rejected: {}", .0.join("; "))]
    UserErrors(Vec<String>),

    #[error("build failed: {0}")]
    Build(String),

    #[error("artifact is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    Fatal(String),
}

/// Credentials and ids for one extension's draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSession {
    pub extension_id: String,
    pub registration_id: String,
    /// Replaced in place after reauthentication
    pub current_token: String,
}

/// Runs the external bundler and returns the artifact.
#[async_trait]
pub trait ExtensionBuilder: Send + Sync {
    async fn build(&self) -> Result<Vec<u8>, PushError>;
}

/// Remote draft endpoint.
#[async_trait]
pub trait DraftClient: Send + Sync {
    async fn push(&self, session: &PushSession, artifact: &[u8]) -> Result<(), PushError>;
}

/// "Get me a valid token" capability.
#[async_trait]
pub trait Reauthenticator: Send + Sync {
    async fn refresh(&self) -> Result<String, PushError>;
}

/// Serialized change -> build -> push loop for one extension.
pub struct DraftActor {
    rx: mpsc::Receiver<DraftMsg>,
    ws_tx: mpsc::Sender<WsMsg>,
    /// Extension handle, for log lines
    handle: String,
    /// Payload uuid reported to the broadcaster
    uuid: String,
    session: PushSession,
    builder: Arc<dyn ExtensionBuilder>,
    policy: RetryPolicy,
    shutdown: Shutdown,
}

impl DraftActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rx: mpsc::Receiver<DraftMsg>,
        ws_tx: mpsc::Sender<WsMsg>,
        handle: impl Into<String>,
        uuid: impl Into<String>,
        session: PushSession,
        builder: Arc<dyn ExtensionBuilder>,
        policy: RetryPolicy,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            rx,
            ws_tx,
            handle: handle.into(),
            uuid: uuid.into(),
            session,
            builder,
            policy,
            shutdown,
        }
    }

    /// Run until shutdown. Only a fatal session error ends it early.
    pub async fn run(mut self) -> Result<(), DevError> {
        loop {
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                msg = self.rx.recv() => msg,
            };

            let mut changed = match msg {
                Some(DraftMsg::Changed(events)) => events.len(),
                Some(DraftMsg::Shutdown) | None => break,
            };

            // Everything queued behind this change rides along
            let mut stop = false;
            while let Ok(msg) = self.rx.try_recv() {
                match msg {
                    DraftMsg::Changed(events) => changed += events.len(),
                    DraftMsg::Shutdown => stop = true,
                }
            }

            crate::debug!("push"; "{}: {} changes", self.handle, changed);
            self.push_once().await?;

            if stop {
                break;
            }
        }

        crate::debug!("push"; "{} stopped", self.handle);
        Ok(())
    }

    async fn push_once(&mut self) -> Result<(), DevError> {
        let outcome = match self.builder.build().await {
            Ok(artifact) => self.policy.execute(&mut self.session, &artifact).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                crate::logger::status_success(&format!("{} pushed", self.handle));
                let msg = WsMsg::ExtensionsUpdated(vec![self.uuid.clone()]);
                if self.ws_tx.send(msg).await.is_err() {
                    crate::debug!("push"; "{}: broadcaster gone, dropping update", self.handle);
                }
                Ok(())
            }
            Err(e) => self.on_error(e.into()),
        }
    }

    fn on_error(&self, err: DevError) -> Result<(), DevError> {
        match err.kind() {
            ErrorKind::FatalSession => Err(err),
            ErrorKind::TransientNetwork => {
                crate::debug!("push"; "{}: {}", self.handle, err);
                crate::logger::status_warning(&format!(
                    "{}: push failed, will retry on next change",
                    self.handle
                ));
                Ok(())
            }
            ErrorKind::Authentication | ErrorKind::Validation | ErrorKind::Conflict => {
                crate::logger::status_error(
                    &format!("{} not pushed", self.handle),
                    &err.to_string(),
                );
                Ok(())
            }
        }
    }
}
