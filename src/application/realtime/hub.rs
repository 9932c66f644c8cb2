//! Realtime hub: one task owning the push connection.
//!
//! Consumers talk to the task through a cloneable [`RealtimeHub`] handle.
//! Topics are reference counted per consumer; the connection is opened by
//! the first subscription and closed when the last topic goes away.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::{ConnectionState, PushConnection};
use super::dispatch::EventDispatcher;
use crate::domain::StudioId;
use crate::error::{Error, Result};
use crate::port::{PushTransport, Topic};

/// Who is listening.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub studio_id: Option<StudioId>,
    pub token: Option<String>,
}

impl Session {
    pub fn authenticated(studio_id: StudioId, token: impl Into<String>) -> Self {
        Self {
            studio_id: Some(studio_id),
            token: Some(token.into()),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Dashboard topic of the session's studio.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthenticated`] without a token or a studio id.
    pub fn dashboard_topic(&self) -> Result<Topic> {
        if !self.is_authenticated() {
            return Err(Error::Unauthenticated("session has no token".into()));
        }
        let studio = self
            .studio_id
            .as_ref()
            .ok_or_else(|| Error::Unauthenticated("session has no studio id".into()))?;
        Ok(Topic::studio_dashboard(studio))
    }
}

/// Proof of one consumer's interest in a topic. Give it back through
/// [`RealtimeHub::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
}

impl Subscription {
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

enum Command {
    Subscribe {
        topic: Topic,
        reply: oneshot::Sender<u64>,
    },
    Unsubscribe {
        id: u64,
        topic: Topic,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the hub task.
#[derive(Clone)]
pub struct RealtimeHub {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl RealtimeHub {
    /// Start the hub task. Pushed messages go to `dispatcher`.
    pub fn spawn<T>(connection: PushConnection<T>, dispatcher: EventDispatcher) -> (Self, JoinHandle<()>)
    where
        T: PushTransport + 'static,
    {
        let (commands, rx) = mpsc::channel(32);
        let state = connection.watch_state();
        let task = HubTask {
            connection,
            dispatcher,
            consumers: HashMap::new(),
            next_id: 1,
        };
        let handle = tokio::spawn(task.run(rx));
        (Self { commands, state }, handle)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Listen to the session studio's dashboard topic.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthenticated`] for sessions without a token or studio id;
    /// [`Error::HubClosed`] if the hub task stopped.
    pub async fn subscribe(&self, session: &Session) -> Result<Subscription> {
        let topic = session.dashboard_topic()?;
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            topic: topic.clone(),
            reply,
        })
        .await?;
        let id = rx.await.map_err(|_| Error::HubClosed)?;
        Ok(Subscription { id, topic })
    }

    /// Drop one consumer's interest.
    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unsubscribe {
            id: subscription.id,
            topic: subscription.topic,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::HubClosed)
    }

    /// Close the connection and stop the task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| Error::HubClosed)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| Error::HubClosed)
    }
}

struct HubTask<T: PushTransport> {
    connection: PushConnection<T>,
    dispatcher: EventDispatcher,
    /// Consumer ids per topic.
    consumers: HashMap<Topic, Vec<u64>>,
    next_id: u64,
}

impl<T: PushTransport> HubTask<T> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(transport = self.connection.transport_name(), "Realtime hub started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.close().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.close().await;
                        break;
                    }
                },
                message = self.connection.next_message(), if self.connection.is_active() => {
                    if let Some(message) = message {
                        debug!(topic = %message.topic, "Push message");
                        self.dispatcher.dispatch(&message.body);
                    }
                }
            }
        }
        info!("Realtime hub stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe { topic, reply } => {
                let id = self.next_id;
                self.next_id += 1;
                let ids = self.consumers.entry(topic.clone()).or_default();
                ids.push(id);
                let first = ids.len() == 1;
                if first {
                    self.open(&topic).await;
                }
                debug!(topic = %topic, consumer = id, "Consumer subscribed");
                let _ = reply.send(id);
            }
            Command::Unsubscribe { id, topic, reply } => {
                let now_empty = match self.consumers.get_mut(&topic) {
                    Some(ids) => {
                        ids.retain(|c| *c != id);
                        ids.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.consumers.remove(&topic);
                    if let Err(e) = self.connection.unsubscribe(&topic).await {
                        warn!(topic = %topic, error = %e, "Unsubscribe failed");
                    }
                    if self.consumers.is_empty() {
                        info!("No topics left, deactivating push connection");
                        if let Err(e) = self.connection.disconnect().await {
                            warn!(error = %e, "Disconnect failed");
                        }
                    }
                }
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
        }
    }

    /// Register `topic`, activating the connection if needed. Failures are
    /// left to the reconnect loop.
    async fn open(&mut self, topic: &Topic) {
        if let Err(e) = self.connection.subscribe(topic).await {
            warn!(topic = %topic, error = %e, "Subscribe failed, will retry on reconnect");
        }
        if !self.connection.is_active() {
            if let Err(e) = self.connection.connect().await {
                warn!(error = %e, "Initial connect failed, will retry");
            }
        }
    }

    async fn close(&mut self) {
        self.consumers.clear();
        if let Err(e) = self.connection.disconnect().await {
            warn!(error = %e, "Disconnect failed");
        }
    }
}
