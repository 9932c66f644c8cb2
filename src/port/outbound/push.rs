//! Realtime push channel port.
//!
//! A transport delivers raw frames from a publish/subscribe broker. It knows
//! nothing about reconnection or event semantics; those live in
//! `application::realtime`.

use std::fmt;

use async_trait::async_trait;

use crate::domain::StudioId;
use crate::error::Result;

/// Broker destination a consumer subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn new(destination: impl Into<String>) -> Self {
        Self(destination.into())
    }

    /// Per-studio dashboard topic: `/topic/studio.{studioId}.dashboard`.
    #[must_use]
    pub fn studio_dashboard(studio: &StudioId) -> Self {
        Self(format!("/topic/studio.{}.dashboard", studio.as_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frame produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    /// A message published on a subscribed topic.
    Message { topic: Topic, body: String },
    /// The connection dropped; the transport must be reconnected.
    Disconnected { reason: String },
}

/// Low-level push transport (e.g. STOMP over WebSocket).
#[async_trait]
pub trait PushTransport: Send {
    /// Open the connection and complete any protocol handshake.
    async fn connect(&mut self) -> Result<()>;

    /// Start receiving messages for `topic`.
    async fn subscribe(&mut self, topic: &Topic) -> Result<()>;

    /// Stop receiving messages for `topic`.
    async fn unsubscribe(&mut self, topic: &Topic) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<()>;

    /// Next frame, or `None` if the transport is not connected or the stream
    /// ended.
    async fn next_frame(&mut self) -> Option<PushFrame>;

    /// Transport name for logging.
    fn transport_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_studio_topic_format() {
        let topic = Topic::studio_dashboard(&StudioId::new("17"));
        assert_eq!(topic.as_str(), "/topic/studio.17.dashboard");
    }
}
