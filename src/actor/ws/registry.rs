use crate::reload::{ConnectionId, PreviewSink, Received};

/// One registered client.
struct PreviewConnection {
    id: ConnectionId,
    sink: Box<dyn PreviewSink>,
    /// Fingerprint of the last payload delivered (skip exact repeats)
    last_payload: Option<u64>,
    /// Closed by the peer; removal pending in the actor
    closed: bool,
}

/// Outcome of one broadcast.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub generation: u64,
    pub sent: usize,
    pub skipped: usize,
    /// Connections dropped because the send failed
    pub dropped: Vec<ConnectionId>,
}

/// Inbound traffic collected by one poll.
#[derive(Debug, Default)]
pub(super) struct Polled {
    pub(super) frames: Vec<(ConnectionId, String)>,
    pub(super) closed: Vec<ConnectionId>,
}

/// Explicit set of open preview connections, owned by the broadcaster.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Vec<PreviewConnection>,
    next_id: u64,
    /// Incremented once per broadcast
    generation: u64,
}

impl ConnectionRegistry {
    pub fn insert(&mut self, sink: Box<dyn PreviewSink>) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections.push(PreviewConnection {
            id,
            sink,
            last_payload: None,
            closed: false,
        });
        id
    }

    /// Close and forget a connection.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(idx) = self.connections.iter().position(|c| c.id == id) else {
            return false;
        };
        let mut conn = self.connections.remove(idx);
        conn.sink.close();
        true
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send `text` to every open connection.
    ///
    /// With a fingerprint, connections whose last delivered payload carried
    /// the same fingerprint are skipped. A failing connection is dropped on
    /// the spot; it never delays delivery to the others.
    pub fn broadcast(&mut self, text: &str, fingerprint: Option<u64>) -> Delivery {
        self.generation += 1;
        let mut delivery = Delivery {
            generation: self.generation,
            ..Delivery::default()
        };

        self.connections.retain_mut(|conn| {
            if conn.closed {
                return true;
            }
            if fingerprint.is_some() && conn.last_payload == fingerprint {
                delivery.skipped += 1;
                return true;
            }
            match conn.sink.send_text(text) {
                Ok(()) => {
                    conn.last_payload = fingerprint;
                    delivery.sent += 1;
                    true
                }
                Err(e) => {
                    crate::debug!("ws"; "client {} dropped: {}", conn.id, e);
                    conn.sink.close();
                    delivery.dropped.push(conn.id);
                    false
                }
            }
        });

        delivery
    }

    /// Send to a single connection (the `connected` handshake).
    pub fn send_to(&mut self, id: ConnectionId, text: &str) -> bool {
        let Some(conn) = self.connections.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        match conn.sink.send_text(text) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("ws"; "client {} dropped: {}", id, e);
                self.remove(id);
                false
            }
        }
    }

    /// Drain readable frames. Closed peers are reported once and stop
    /// receiving until the actor removes them.
    pub(super) fn poll(&mut self) -> Polled {
        let mut polled = Polled::default();
        for conn in self.connections.iter_mut().filter(|c| !c.closed) {
            loop {
                match conn.sink.try_recv() {
                    Received::Text(text) => polled.frames.push((conn.id, text)),
                    Received::Idle => break,
                    Received::Closed => {
                        conn.closed = true;
                        polled.closed.push(conn.id);
                        break;
                    }
                }
            }
        }
        polled
    }

    pub fn close_all(&mut self) {
        for mut conn in self.connections.drain(..) {
            conn.sink.close();
        }
    }
}
