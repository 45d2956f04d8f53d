//! WebSocket Actor - Live Reload Broadcaster
//!
//! Owns the preview connections and the payload state served to them:
//! - `connected` handshake with the full payload, once per client
//! - `update` broadcasts for theme file changes and extension pushes
//! - client `update` / `dispatch` / `log` frames
//!
//! ```text
//! FsActor / SyncActor / DraftActor --> WsActor --> PreviewSink --> client
//!                                         ^                          |
//!                                         +------- client frames ----+
//! ```

mod client_io;
mod delivery;
mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::messages::WsMsg;
use crate::asset::AssetStore;
use crate::core::Shutdown;
use crate::reload::PayloadStore;

pub use registry::{ConnectionRegistry, Delivery};

/// WebSocket Actor - manages client connections and broadcasts
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    /// Handed to the reader thread for client frames
    tx: mpsc::Sender<WsMsg>,
    /// Shared between the actor and the reader thread
    registry: Arc<Mutex<ConnectionRegistry>>,
    payload: PayloadStore,
    /// Theme files, for checksums in file updates
    theme_store: Option<Arc<AssetStore>>,
    shutdown: Shutdown,
}

impl WsActor {
    pub fn new(
        rx: mpsc::Receiver<WsMsg>,
        tx: mpsc::Sender<WsMsg>,
        payload: PayloadStore,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            rx,
            tx,
            registry: Arc::new(Mutex::new(ConnectionRegistry::default())),
            payload,
            theme_store: None,
            shutdown,
        }
    }

    pub fn with_theme_store(mut self, store: Arc<AssetStore>) -> Self {
        self.theme_store = Some(store);
        self
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let stop = Arc::new(AtomicBool::new(false));
        {
            let registry = Arc::clone(&self.registry);
            let tx = self.tx.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || Self::client_reader_loop(registry, tx, stop));
        }

        loop {
            let msg = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                msg = self.rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            match msg {
                WsMsg::AddClient(stream) => self.add_client(stream),
                WsMsg::Register(sink) => {
                    self.register(sink);
                }
                WsMsg::FilesChanged { keys, origin } => self.files_changed(&keys, origin),
                WsMsg::ExtensionsUpdated(ids) => self.extensions_updated(&ids),
                WsMsg::Inbound { from, text } => self.handle_inbound(from, &text),
                WsMsg::Disconnected(id) => {
                    if self.registry.lock().remove(id) {
                        crate::debug!("ws"; "client {} disconnected", id);
                    }
                }
                WsMsg::Shutdown => break,
            }
        }

        crate::debug!("ws"; "shutting down");
        stop.store(true, Ordering::Relaxed);
        self.registry.lock().close_all();
    }
}
