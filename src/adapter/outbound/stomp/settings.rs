//! Realtime push channel configuration.

use serde::Deserialize;

use super::frame::HeartBeat;

/// STOMP-over-WebSocket endpoint settings (`[realtime]`).
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint, e.g. `wss://api.example.com/ws`.
    #[serde(default)]
    pub ws_url: String,
    /// STOMP virtual host. Defaults to the URL host.
    #[serde(default)]
    pub host: Option<String>,
    /// Interval at which this client can send heart-beats (0 disables).
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u32,
    /// Interval at which this client wants server heart-beats (0 disables).
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u32,
    /// Time allowed for the WebSocket upgrade plus the STOMP handshake.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Capacity of the applied-event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

const fn default_heartbeat_ms() -> u32 {
    10_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_event_capacity() -> usize {
    256
}

impl RealtimeConfig {
    #[must_use]
    pub const fn heartbeat(&self) -> HeartBeat {
        HeartBeat::new(self.heartbeat_outgoing_ms, self.heartbeat_incoming_ms)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            host: None,
            heartbeat_outgoing_ms: default_heartbeat_ms(),
            heartbeat_incoming_ms: default_heartbeat_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}
