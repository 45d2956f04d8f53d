use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::WsActor;
use super::registry::ConnectionRegistry;
use crate::actor::messages::WsMsg;
use crate::reload::{ConnectionId, Outgoing, PreviewSink, WsConnection};

/// Poll interval of the reader thread
const READ_POLL: Duration = Duration::from_millis(50);

impl WsActor {
    /// Handshake a raw stream from the accept thread and register it.
    pub(super) fn add_client(&self, stream: TcpStream) {
        match WsConnection::accept(stream) {
            Ok(conn) => {
                self.register(Box::new(conn));
            }
            Err(e) => crate::log!("ws"; "handshake failed: {}", e),
        }
    }

    /// Register an open connection and send `connected` exactly once.
    pub(super) fn register(&self, sink: Box<dyn PreviewSink>) -> Option<ConnectionId> {
        let connected = Outgoing::connected(self.payload.connected()).to_json();

        let mut registry = self.registry.lock();
        let id = registry.insert(sink);
        if !registry.send_to(id, &connected) {
            crate::log!("ws"; "failed to send connected payload to {}", id);
            return None;
        }
        crate::debug!("ws"; "client {} connected (total: {})", id, registry.len());
        Some(id)
    }

    /// Background thread: poll every connection for inbound frames and hand
    /// them to the actor, so client messages and server updates share one
    /// ordering.
    pub(super) fn client_reader_loop(
        registry: Arc<Mutex<ConnectionRegistry>>,
        tx: mpsc::Sender<WsMsg>,
        stop: Arc<AtomicBool>,
    ) {
        while !stop.load(Ordering::Relaxed) {
            std::thread::sleep(READ_POLL);

            // Collect under the lock, send after releasing it
            let polled = registry.lock().poll();

            let messages = polled
                .frames
                .into_iter()
                .map(|(from, text)| WsMsg::Inbound { from, text })
                .chain(polled.closed.into_iter().map(WsMsg::Disconnected));

            for msg in messages {
                if tx.blocking_send(msg).is_err() {
                    return;
                }
            }
        }
    }
}
