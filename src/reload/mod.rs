//! Reload Module
//!
//! Websocket-based live updates for preview clients.
//!
//! ```text
//! FsActor / SyncActor / DraftActor -> WsActor -> PreviewSink -> client
//!                                        ^                        |
//!                                        +---- update/dispatch ---+
//! ```
//!
//! # Modules
//!
//! - `connection` - `PreviewSink` seam and the websocket transport
//! - `message` - wire frames (`connected`, `update`, dispatch, log)
//! - `payload` - app / store / extension state served to clients
//! - `server` - accept thread for client connections

pub mod connection;
pub mod message;
pub mod payload;
pub mod server;

pub use connection::{ConnectionId, PreviewSink, Received, SinkError, WsConnection};
pub use message::{Inbound, MANIFEST_VERSION, Outgoing, parse_inbound};
pub use payload::PayloadStore;
