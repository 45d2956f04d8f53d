//! Session-level error taxonomy.
//!
//! Component errors stay specific (`AssetError`, `RemoteError`, ...). Each
//! maps onto one `DevError` so the session can decide between "log and keep
//! going" and "terminate". Only `FatalSession` ends the dev command.

use thiserror::Error;

use crate::actor::draft::PushError;
use crate::asset::{AssetError, FileKey};
use crate::config::ConfigError;
use crate::proxy::RenderError;
use crate::sync::{RemoteError, SyncError};

/// Coarse classification used for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retried on the next cycle, logged at debug level.
    TransientNetwork,
    /// One retry after reauthentication, then fatal for that push.
    Authentication,
    /// Never auto-resolved; aborts the cycle.
    Conflict,
    /// Fatal for one file operation; the session continues.
    Validation,
    /// Terminates the session.
    FatalSession,
}

#[derive(Debug, Error)]
pub enum DevError {
    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{}", conflict_message(.0))]
    Conflict(Vec<FileKey>),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    FatalSession(String),
}

impl DevError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientNetwork(_) => ErrorKind::TransientNetwork,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::FatalSession(_) => ErrorKind::FatalSession,
        }
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::FatalSession
    }
}

/// Human readable conflict summary naming every key.
pub fn conflict_message(keys: &[FileKey]) -> String {
    let names = keys
        .iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let noun = if keys.len() == 1 { "file" } else { "files" };
    format!("Detected changes to the {noun} {names} on both local and remote sources. Aborting...")
}

/// Error message including the `source()` chain.
pub fn chain_message(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ============================================================================
// Component mappings
// ============================================================================

impl From<AssetError> for DevError {
    fn from(err: AssetError) -> Self {
        Self::Validation(chain_message(&err))
    }
}

impl From<RemoteError> for DevError {
    fn from(err: RemoteError) -> Self {
        let message = chain_message(&err);
        match err {
            RemoteError::Unauthorized { .. } => Self::Authentication(message),
            RemoteError::NotFound(_) => Self::FatalSession(message),
            RemoteError::Transport { .. }
            | RemoteError::Timeout(_)
            | RemoteError::Status { .. }
            | RemoteError::Decode(_) => Self::TransientNetwork(message),
        }
    }
}

impl From<SyncError> for DevError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Timeout(_) => Self::TransientNetwork(err.to_string()),
            SyncError::Remote(e) => e.into(),
            SyncError::Conflict(keys) => Self::Conflict(keys),
            SyncError::Asset(e) => e.into(),
        }
    }
}

impl From<RenderError> for DevError {
    fn from(err: RenderError) -> Self {
        let message = chain_message(&err);
        match err {
            RenderError::Upstream { status: 401 | 403, .. } => Self::Authentication(message),
            RenderError::Transport { .. }
            | RenderError::Upstream { .. }
            | RenderError::Cancelled => Self::TransientNetwork(message),
        }
    }
}

impl From<PushError> for DevError {
    fn from(err: PushError) -> Self {
        let message = chain_message(&err);
        match err {
            PushError::Unauthorized(_) => Self::Authentication(message),
            PushError::Transient(_) => Self::TransientNetwork(message),
            PushError::UserErrors(_) | PushError::Build(_) | PushError::TooLarge { .. } => {
                Self::Validation(message)
            }
            PushError::Fatal(_) => Self::FatalSession(message),
        }
    }
}

impl From<ConfigError> for DevError {
    fn from(err: ConfigError) -> Self {
        Self::FatalSession(chain_message(&err))
    }
}
