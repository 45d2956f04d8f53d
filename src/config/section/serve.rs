//! `[serve]` section configuration.
//!
//! Contains the local preview server settings.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 9292                 # Preview HTTP port
//! ws_port = 9293              # Live reload port (default: port + 1)
//! render_timeout_ms = 30000   # Upper bound for one render request
//! ```
//!
//! Both ports are retried upwards when already taken.

use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

/// Preview server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// WebSocket port for live reload.
    pub ws_port: Option<u16>,

    pub render_timeout_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 9292,
            ws_port: None,
            render_timeout_ms: 30_000,
        }
    }
}

impl ServeConfig {
    pub fn ws_port(&self) -> u16 {
        self.ws_port.unwrap_or(self.port.saturating_add(1))
    }
}
