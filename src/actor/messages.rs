//! Actor Message Definitions
//!
//! Message types for inter-actor communication.
//!
//! ```text
//! FsActor --FilesChanged--> WsActor <--FilesChanged-- SyncActor
//!    |                         ^
//!    +--Changed--> DraftActor -+ ExtensionsUpdated
//! ```

use std::net::TcpStream;
use std::sync::Arc;

use crate::asset::{Asset, FileKey};
use crate::reload::{ConnectionId, PreviewSink};

// =============================================================================
// Change events (FsActor output)
// =============================================================================

/// What happened to a key after debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Add,
    Change,
    Unlink,
}

impl ChangeType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Unlink => "unlink",
        }
    }
}

/// A debounced, store-consistent file event.
///
/// For `Add` / `Change` the store already holds `asset` when the event is
/// delivered; `Unlink` carries no content.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeType,
    pub key: FileKey,
    pub asset: Option<Arc<Asset>>,
}

impl ChangeEvent {
    pub fn unlink(key: FileKey) -> Self {
        Self {
            kind: ChangeType::Unlink,
            key,
            asset: None,
        }
    }
}

/// Which side produced a batch of changed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Edited on disk
    Local,
    /// Pulled by a reconciliation cycle
    Remote,
}

impl ChangeOrigin {
    pub fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

// =============================================================================
// DraftActor Messages
// =============================================================================

/// Messages to one extension's push loop.
#[derive(Debug)]
pub enum DraftMsg {
    /// Files of this extension changed
    Changed(Vec<ChangeEvent>),
    /// Shutdown
    Shutdown,
}

// =============================================================================
// WsActor Messages
// =============================================================================

/// Messages to WebSocket Actor
pub enum WsMsg {
    /// Raw TCP stream from the accept thread (handshake pending)
    AddClient(TcpStream),
    /// Already-established connection (in-process sinks)
    Register(Box<dyn PreviewSink>),
    /// Theme files changed on one side
    FilesChanged {
        keys: Vec<FileKey>,
        origin: ChangeOrigin,
    },
    /// Extensions rebuilt and pushed (by uuid)
    ExtensionsUpdated(Vec<String>),
    /// Text frame received from a client
    Inbound { from: ConnectionId, text: String },
    /// Client closed or failed
    Disconnected(ConnectionId),
    /// Close every connection and stop
    Shutdown,
}

impl std::fmt::Debug for WsMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddClient(_) => f.write_str("AddClient"),
            Self::Register(_) => f.write_str("Register"),
            Self::FilesChanged { keys, origin } => f
                .debug_struct("FilesChanged")
                .field("keys", keys)
                .field("origin", origin)
                .finish(),
            Self::ExtensionsUpdated(ids) => f.debug_tuple("ExtensionsUpdated").field(ids).finish(),
            Self::Inbound { from, .. } => f.debug_struct("Inbound").field("from", from).finish(),
            Self::Disconnected(id) => f.debug_tuple("Disconnected").field(id).finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}
