//! STOMP over WebSocket push adapter.

pub mod frame;
pub mod settings;
pub mod transport;

pub use settings::RealtimeConfig;
pub use transport::StompTransport;
