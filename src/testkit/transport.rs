//! Mock [`PushTransport`] implementations.
//!
//! - [`ScriptedTransport`]: pre-loaded connect/subscribe results and a fixed
//!   frame queue. Best for reconnection and error handling.
//! - [`ChannelTransport`]: frames pushed on demand through a
//!   [`ChannelTransportHandle`]. Best for hub and end-to-end merge tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::port::{PushFrame, PushTransport, Topic};

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// A mock transport with scripted results and a fixed frame queue.
///
/// Each call to `connect()` or `subscribe()` pops the next result from the
/// corresponding queue (defaults to `Ok(())` when exhausted). A `None` entry
/// in the frame queue ends the stream once; an exhausted queue is a silent,
/// still-open connection.
pub struct ScriptedTransport {
    connect_results: VecDeque<Result<()>>,
    subscribe_results: VecDeque<Result<()>>,
    frames: VecDeque<Option<PushFrame>>,
    connect_count: Arc<AtomicU32>,
    subscribe_count: Arc<AtomicU32>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            connect_results: VecDeque::new(),
            subscribe_results: VecDeque::new(),
            frames: VecDeque::new(),
            connect_count: Arc::new(AtomicU32::new(0)),
            subscribe_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_connect_results(mut self, results: Vec<Result<()>>) -> Self {
        self.connect_results = results.into();
        self
    }

    pub fn with_subscribe_results(mut self, results: Vec<Result<()>>) -> Self {
        self.subscribe_results = results.into();
        self
    }

    pub fn with_frames(mut self, frames: Vec<Option<PushFrame>>) -> Self {
        self.frames = frames.into();
        self
    }

    /// Shared `(connect, subscribe)` call counters.
    pub fn counts(&self) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (self.connect_count.clone(), self.subscribe_count.clone())
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn subscribe(&mut self, _topic: &Topic) -> Result<()> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        self.subscribe_results.pop_front().unwrap_or(Ok(()))
    }

    async fn unsubscribe(&mut self, _topic: &Topic) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<PushFrame> {
        match self.frames.pop_front() {
            Some(frame) => frame,
            None => std::future::pending().await,
        }
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChannelState {
    connects: AtomicU32,
    disconnects: AtomicU32,
    topics: Mutex<Vec<Topic>>,
}

/// A mock transport fed through a [`ChannelTransportHandle`].
pub struct ChannelTransport {
    frame_rx: tokio::sync::mpsc::Receiver<Option<PushFrame>>,
    state: Arc<ChannelState>,
}

/// Control handle for a [`ChannelTransport`].
pub struct ChannelTransportHandle {
    frame_tx: tokio::sync::mpsc::Sender<Option<PushFrame>>,
    state: Arc<ChannelState>,
}

impl ChannelTransportHandle {
    /// Deliver `body` on `topic`.
    pub async fn publish(&self, topic: &Topic, body: impl Into<String>) {
        let _ = self
            .frame_tx
            .send(Some(PushFrame::Message {
                topic: topic.clone(),
                body: body.into(),
            }))
            .await;
    }

    /// Deliver an arbitrary frame.
    pub async fn send(&self, frame: PushFrame) {
        let _ = self.frame_tx.send(Some(frame)).await;
    }

    /// Signal end-of-stream (`next_frame` returns `None` once).
    pub async fn close(&self) {
        let _ = self.frame_tx.send(None).await;
    }

    pub fn connect_count(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Topics the transport is currently subscribed to.
    pub fn topics(&self) -> Vec<Topic> {
        self.state.topics.lock().clone()
    }
}

/// Create a [`ChannelTransport`] and its control handle.
pub fn channel_transport(buffer: usize) -> (ChannelTransport, ChannelTransportHandle) {
    let (tx, rx) = tokio::sync::mpsc::channel(buffer);
    let state = Arc::new(ChannelState::default());
    (
        ChannelTransport {
            frame_rx: rx,
            state: Arc::clone(&state),
        },
        ChannelTransportHandle {
            frame_tx: tx,
            state,
        },
    )
}

#[async_trait]
impl PushTransport for ChannelTransport {
    async fn connect(&mut self) -> Result<()> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &Topic) -> Result<()> {
        let mut topics = self.state.topics.lock();
        if !topics.contains(topic) {
            topics.push(topic.clone());
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &Topic) -> Result<()> {
        self.state.topics.lock().retain(|t| t != topic);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state.topics.lock().clear();
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<PushFrame> {
        match self.frame_rx.recv().await {
            Some(frame) => frame,
            None => std::future::pending().await,
        }
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}
