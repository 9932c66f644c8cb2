//! Reconnecting push connection.
//!
//! Wraps any [`PushTransport`] with an explicit connection state machine,
//! exponential backoff with jitter, a circuit breaker, and a topic registry
//! that is replayed after every reconnect.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::infrastructure::config::reconnection::ReconnectionConfig;
use crate::port::{PushFrame, PushTransport, Topic};

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub topic: Topic,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    /// Too many consecutive failures; attempts blocked until `until`.
    Open { until: Instant },
}

/// Push transport with automatic reconnection.
///
/// The connection is *active* between [`connect`](Self::connect) and
/// [`disconnect`](Self::disconnect). While active,
/// [`next_message`](Self::next_message) reconnects and resubscribes on its
/// own.
pub struct PushConnection<T: PushTransport> {
    inner: T,
    config: ReconnectionConfig,
    topics: BTreeSet<Topic>,
    consecutive_failures: u32,
    current_delay_ms: u64,
    circuit_state: CircuitState,
    active: bool,
    state_tx: watch::Sender<ConnectionState>,
}

impl<T: PushTransport> PushConnection<T> {
    pub fn new(inner: T, config: ReconnectionConfig) -> Self {
        let initial_delay = config.initial_delay_ms;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner,
            config,
            topics: BTreeSet::new(),
            consecutive_failures: 0,
            current_delay_ms: initial_delay,
            circuit_state: CircuitState::Closed,
            active: false,
            state_tx,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// True between `connect` and `disconnect`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.inner.transport_name()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Push connection state");
        }
    }

    fn reset_backoff(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay_ms = self.config.initial_delay_ms;
        self.circuit_state = CircuitState::Closed;
    }

    /// Current backoff delay plus jitter; advances the delay for next time.
    fn next_delay(&mut self) -> Duration {
        let base_delay = Duration::from_millis(self.current_delay_ms);
        let delay = base_delay + Duration::from_millis(jitter_ms(base_delay));

        let next_delay = (self.current_delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay_ms = next_delay.min(self.config.max_delay_ms);

        delay
    }

    fn circuit_allows_connection(&mut self) -> bool {
        match self.circuit_state {
            CircuitState::Closed => true,
            CircuitState::Open { until } => {
                if Instant::now() >= until {
                    info!("Circuit breaker cooldown expired, allowing reconnection");
                    self.reset_backoff();
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.set_state(ConnectionState::Disconnected);

        if self.consecutive_failures >= self.config.max_consecutive_failures {
            let cooldown = Duration::from_millis(self.config.circuit_breaker_cooldown_ms);
            self.circuit_state = CircuitState::Open {
                until: Instant::now() + cooldown,
            };
            error!(
                failures = self.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Circuit breaker tripped, pausing reconnection attempts"
            );
        }
    }

    /// Connect the transport and replay every registered topic.
    async fn establish(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        if let Err(e) = self.inner.connect().await {
            self.record_failure();
            return Err(e);
        }
        let mut failed = None;
        for topic in &self.topics {
            if let Err(e) = self.inner.subscribe(topic).await {
                error!(topic = %topic, error = %e, "Resubscribe failed after connect");
                failed = Some(e);
                break;
            }
        }
        if let Some(e) = failed {
            self.record_failure();
            return Err(e);
        }
        if !self.topics.is_empty() {
            debug!(topics = self.topics.len(), "Subscribed registered topics");
        }
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Wait out the backoff (and the circuit breaker, if open), then connect.
    async fn reconnect(&mut self) -> Result<()> {
        if !self.circuit_allows_connection() {
            if let CircuitState::Open { until } = self.circuit_state {
                let remaining = until.saturating_duration_since(Instant::now());
                warn!(
                    remaining_secs = remaining.as_secs(),
                    "Circuit breaker open, waiting for cooldown"
                );
                sleep(remaining).await;
                self.reset_backoff();
            }
        }

        let delay = self.next_delay();
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.consecutive_failures + 1,
            transport = self.inner.transport_name(),
            "Reconnecting after delay"
        );
        sleep(delay).await;

        self.establish().await?;
        info!("Reconnected successfully");
        self.reset_backoff();
        Ok(())
    }

    /// Activate the connection. No-op when already connected.
    ///
    /// On failure the connection stays active, so the next
    /// [`next_message`](Self::next_message) call keeps retrying.
    pub async fn connect(&mut self) -> Result<()> {
        self.active = true;
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        self.establish().await?;
        self.reset_backoff();
        Ok(())
    }

    /// Register `topic`. Returns `false` if it was already registered.
    ///
    /// When connected the transport subscribes immediately; otherwise the
    /// topic is subscribed on the next (re)connect.
    pub async fn subscribe(&mut self, topic: &Topic) -> Result<bool> {
        if !self.topics.insert(topic.clone()) {
            return Ok(false);
        }
        if self.state() == ConnectionState::Connected {
            if let Err(e) = self.inner.subscribe(topic).await {
                // Kept registered; the reconnect replays it.
                self.record_failure();
                return Err(e);
            }
        }
        info!(topic = %topic, "Subscribed");
        Ok(true)
    }

    /// Forget `topic`. Returns `false` if it was not registered.
    pub async fn unsubscribe(&mut self, topic: &Topic) -> Result<bool> {
        if !self.topics.remove(topic) {
            return Ok(false);
        }
        if self.state() == ConnectionState::Connected {
            self.inner.unsubscribe(topic).await?;
        }
        info!(topic = %topic, "Unsubscribed");
        Ok(true)
    }

    /// Deactivate and close the transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.active = false;
        let was_open = self.state() != ConnectionState::Disconnected;
        self.set_state(ConnectionState::Disconnected);
        if was_open {
            self.inner.disconnect().await?;
            info!("Push connection closed");
        }
        Ok(())
    }

    /// Next message, reconnecting as needed. `None` once deactivated.
    pub async fn next_message(&mut self) -> Option<PushMessage> {
        loop {
            if !self.active {
                return None;
            }
            if self.state() != ConnectionState::Connected {
                if let Err(e) = self.reconnect().await {
                    warn!(error = %e, "Reconnection attempt failed, will retry");
                    continue;
                }
            }

            match self.inner.next_frame().await {
                Some(PushFrame::Message { topic, body }) => {
                    if self.consecutive_failures > 0 {
                        debug!("Received message after reconnection, resetting failure count");
                        self.reset_backoff();
                    }
                    return Some(PushMessage { topic, body });
                }
                Some(PushFrame::Disconnected { reason }) => {
                    warn!(reason = %reason, "Connection lost, will reconnect");
                    self.record_failure();
                }
                None => {
                    warn!("Push stream ended unexpectedly, will reconnect");
                    self.record_failure();
                }
            }
        }
    }
}

/// Up to 20% random jitter on top of `base_delay`.
fn jitter_ms(base_delay: Duration) -> u64 {
    let jitter_range_ms = (base_delay.as_millis() as u64) / 5;
    if jitter_range_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=jitter_range_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::error::Error;
    use crate::testkit;
    use crate::testkit::transport::ScriptedTransport;

    fn backoff_config() -> ReconnectionConfig {
        ReconnectionConfig {
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_consecutive_failures: 3,
            circuit_breaker_cooldown_ms: 50,
        }
    }

    fn topic() -> Topic {
        testkit::domain::studio_topic("17")
    }

    #[tokio::test]
    async fn test_state_transitions_on_connect() {
        let mut conn = PushConnection::new(ScriptedTransport::new(), backoff_config());
        let mut states = conn.watch_state();
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        conn.connect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

        conn.disconnect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_active());
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let transport = ScriptedTransport::new();
        let (_, subscribe_count) = transport.counts();
        let mut conn = PushConnection::new(transport, backoff_config());
        conn.connect().await.unwrap();

        assert!(conn.subscribe(&topic()).await.unwrap());
        assert!(!conn.subscribe(&topic()).await.unwrap());
        assert_eq!(subscribe_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_topics_registered_offline_are_subscribed_on_connect() {
        let transport = ScriptedTransport::new();
        let (_, subscribe_count) = transport.counts();
        let mut conn = PushConnection::new(transport, backoff_config());

        conn.subscribe(&topic()).await.unwrap();
        assert_eq!(subscribe_count.load(Ordering::SeqCst), 0);

        conn.connect().await.unwrap();
        assert_eq!(subscribe_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect_resubscribes() {
        let transport = ScriptedTransport::new().with_frames(vec![
            Some(testkit::domain::disconnect_frame("server restart")),
            Some(testkit::domain::message_frame("17", "{}")),
        ]);
        let (connect_count, subscribe_count) = transport.counts();
        let mut conn = PushConnection::new(transport, backoff_config());
        conn.connect().await.unwrap();
        conn.subscribe(&topic()).await.unwrap();

        let message = conn.next_message().await.unwrap();
        assert_eq!(message.topic, topic());
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(connect_count.load(Ordering::SeqCst), 2);
        assert_eq!(subscribe_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inactive_connection_yields_nothing() {
        let mut conn = PushConnection::new(ScriptedTransport::new(), backoff_config());
        assert!(conn.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_connect_stays_active() {
        let transport = ScriptedTransport::new()
            .with_connect_results(vec![Err(Error::Connection("refused".into()))]);
        let mut conn = PushConnection::new(transport, backoff_config());

        assert!(conn.connect().await.is_err());
        assert!(conn.is_active());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_topic() {
        let mut conn = PushConnection::new(ScriptedTransport::new(), backoff_config());
        conn.connect().await.unwrap();
        assert!(!conn.unsubscribe(&topic()).await.unwrap());
        conn.subscribe(&topic()).await.unwrap();
        assert!(conn.unsubscribe(&topic()).await.unwrap());
        assert_eq!(conn.topics().count(), 0);
    }

    #[tokio::test]
    async fn test_exponential_backoff() {
        let mut conn = PushConnection::new(ScriptedTransport::new(), backoff_config());

        let assert_delay_in_range = |delay: Duration, base_ms: u64| {
            let max_ms = base_ms + (base_ms / 5);
            assert!(
                (base_ms..=max_ms).contains(&(delay.as_millis() as u64)),
                "delay {delay:?} not within {base_ms}..={max_ms} ms"
            );
        };

        assert_delay_in_range(conn.next_delay(), 10);
        assert_delay_in_range(conn.next_delay(), 20);
        assert_delay_in_range(conn.next_delay(), 40);
        assert_delay_in_range(conn.next_delay(), 80);
        assert_delay_in_range(conn.next_delay(), 100);
    }

    #[tokio::test]
    async fn test_circuit_breaker_trips_and_cools_down() {
        let mut conn = PushConnection::new(ScriptedTransport::new(), backoff_config());
        for _ in 0..3 {
            conn.record_failure();
        }
        assert!(matches!(conn.circuit_state, CircuitState::Open { .. }));
        assert!(!conn.circuit_allows_connection());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(conn.circuit_allows_connection());
        assert_eq!(conn.consecutive_failures, 0);
    }

    #[test]
    fn test_zero_base_delay_zero_jitter() {
        assert_eq!(jitter_ms(Duration::ZERO), 0);
    }
}
