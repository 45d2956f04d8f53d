//! Preview client connections.
//!
//! `PreviewSink` is the seam between the broadcaster and the transport: the
//! websocket implementation lives here, tests plug in in-memory sinks.

use std::fmt;
use std::io::ErrorKind;
use std::net::TcpStream;

use thiserror::Error;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

/// Stable id of one connection for the lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("connection closed")]
    Closed,
    #[error("{0}")]
    Transport(String),
}

/// Result of a non-blocking read.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Text(String),
    /// Nothing buffered right now
    Idle,
    Closed,
}

/// One open client channel.
pub trait PreviewSink: Send {
    /// Queue a text frame. Must not block on a slow peer.
    fn send_text(&mut self, text: &str) -> Result<(), SinkError>;

    /// Poll for one inbound text frame.
    fn try_recv(&mut self) -> Received;

    fn close(&mut self);
}

/// Websocket transport over a non-blocking TCP stream.
pub struct WsConnection {
    ws: WebSocket<TcpStream>,
}

impl WsConnection {
    /// Complete the server handshake on a freshly accepted stream.
    ///
    /// The handshake runs blocking; the socket is switched to non-blocking
    /// afterwards so reads can be polled and sends never stall the actor.
    pub fn accept(stream: TcpStream) -> Result<Self, SinkError> {
        let ws = tungstenite::accept(stream).map_err(|e| SinkError::Transport(e.to_string()))?;
        ws.get_ref()
            .set_nonblocking(true)
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self { ws })
    }
}

fn would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e) if e.kind() == ErrorKind::WouldBlock)
}

impl PreviewSink for WsConnection {
    fn send_text(&mut self, text: &str) -> Result<(), SinkError> {
        match self.ws.send(Message::Text(text.to_string().into())) {
            Ok(()) => Ok(()),
            // Frame stays queued in tungstenite's write buffer
            Err(ref e) if would_block(e) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(SinkError::Closed)
            }
            Err(e) => Err(SinkError::Transport(e.to_string())),
        }
    }

    fn try_recv(&mut self) -> Received {
        match self.ws.read() {
            Ok(Message::Text(text)) => Received::Text(text.as_str().to_string()),
            Ok(Message::Close(_)) => Received::Closed,
            Ok(_) => Received::Idle,
            Err(ref e) if would_block(e) => {
                // Flush frames left over from an earlier WouldBlock
                let _ = self.ws.flush();
                Received::Idle
            }
            Err(_) => Received::Closed,
        }
    }

    fn close(&mut self) {
        let _ = self.ws.close(None);
        let _ = self.ws.flush();
    }
}
