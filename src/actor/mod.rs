//! Actor System for a Dev Session
//!
//! Message-passing concurrency between the watchers, the sync loop, the
//! draft push loops and the live reload broadcaster:
//!
//! ```text
//! FsActor ──────────────────────> WsActor
//! (watch)                        (broadcast)
//! FsActor ──> DraftActor ───────>    ^
//! (watch)     (build + push)         |
//! SyncActor ─────────────────────────┘
//! (poll)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `sync` - Periodic remote reconciliation
//! - `draft` - Per-extension build and push loop
//! - `ws` - WebSocket broadcast
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod draft;
pub mod fs;
pub mod messages;
pub mod sync;
pub mod ws;

pub use coordinator::Coordinator;
