//! STOMP 1.2 over WebSocket.
//!
//! Implements [`PushTransport`]: the WebSocket upgrade and the STOMP
//! `CONNECT`/`CONNECTED` handshake happen in `connect`, subscriptions get
//! one STOMP subscription id per topic, and `next_frame` turns `MESSAGE`
//! frames into [`PushFrame::Message`]. Heart-beats are negotiated at connect
//! time; a silent server is reported as a disconnect.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::frame::{Command, Frame, HeartBeat};
use super::settings::RealtimeConfig;
use crate::error::{Error, Result};
use crate::port::{PushFrame, PushTransport, Topic};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Servers get this much slack on top of the negotiated heart-beat interval.
const SILENCE_TOLERANCE: u32 = 2;

enum Wake {
    Incoming(Option<std::result::Result<Message, tungstenite::Error>>),
    Beat,
    Silent,
}

pub struct StompTransport {
    url: String,
    host: String,
    token: Option<String>,
    heartbeat: HeartBeat,
    connect_timeout: Duration,
    ws: Option<WsStream>,
    /// STOMP subscription id per topic.
    subscriptions: HashMap<Topic, String>,
    next_subscription: u64,
    send_every: Option<Duration>,
    expect_within: Option<Duration>,
    last_sent: Instant,
    last_received: Instant,
    /// Frames decoded from one WebSocket message but not yet returned.
    pending: VecDeque<PushFrame>,
}

impl StompTransport {
    /// Transport for `url` with default heart-beats. `token` is sent as a
    /// bearer `Authorization` header on `CONNECT`.
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self::from_config(
            &RealtimeConfig {
                ws_url: url.into(),
                ..RealtimeConfig::default()
            },
            token,
        )
    }

    pub fn from_config(config: &RealtimeConfig, token: Option<String>) -> Self {
        let host = config
            .host
            .clone()
            .or_else(|| {
                url::Url::parse(&config.ws_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
            })
            .unwrap_or_else(|| "localhost".to_string());
        let now = Instant::now();
        Self {
            url: config.ws_url.clone(),
            host,
            token,
            heartbeat: config.heartbeat(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            ws: None,
            subscriptions: HashMap::new(),
            next_subscription: 1,
            send_every: None,
            expect_within: None,
            last_sent: now,
            last_received: now,
            pending: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    /// STOMP subscription id currently used for `topic`.
    #[must_use]
    pub fn subscription_id(&self, topic: &Topic) -> Option<&str> {
        self.subscriptions.get(topic).map(String::as_str)
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| Error::Connection("Not connected".into()))?;
        ws.send(Message::Text(frame.encode())).await?;
        self.last_sent = Instant::now();
        Ok(())
    }

    fn drop_connection(&mut self) {
        self.ws = None;
        self.subscriptions.clear();
        self.send_every = None;
        self.expect_within = None;
    }

    fn topic_for(&self, frame: &Frame) -> Option<Topic> {
        if let Some(id) = frame.get("subscription") {
            if let Some((topic, _)) = self.subscriptions.iter().find(|(_, sub)| *sub == id) {
                return Some(topic.clone());
            }
        }
        frame.get("destination").map(Topic::new)
    }

    /// Decode a WebSocket payload into pending push frames.
    fn absorb(&mut self, text: &str) {
        let frames = match Frame::decode_all(text) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(error = %e, bytes = text.len(), "Failed to decode STOMP frame");
                return;
            }
        };
        for frame in frames {
            match frame.command {
                Command::Message => match self.topic_for(&frame) {
                    Some(topic) => self.pending.push_back(PushFrame::Message {
                        topic,
                        body: frame.body,
                    }),
                    None => warn!("MESSAGE frame without destination, dropping"),
                },
                Command::Error => {
                    let reason = frame
                        .get("message")
                        .map(str::to_string)
                        .unwrap_or_else(|| frame.body.clone());
                    error!(reason = %reason, "STOMP ERROR frame");
                    self.pending.push_back(PushFrame::Disconnected { reason });
                }
                other => trace!(command = %other, "Ignoring STOMP frame"),
            }
        }
    }

    fn next_pending(&mut self) -> Option<PushFrame> {
        let frame = self.pending.pop_front()?;
        if matches!(frame, PushFrame::Disconnected { .. }) {
            self.pending.clear();
            self.drop_connection();
        }
        Some(frame)
    }
}

/// Send `CONNECT` and wait for `CONNECTED`. Returns the server's heart-beat.
async fn handshake(ws: &mut WsStream, connect: &Frame) -> Result<HeartBeat> {
    ws.send(Message::Text(connect.encode())).await?;
    while let Some(message) = ws.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Ping(data) => {
                ws.send(Message::Pong(data)).await?;
                continue;
            }
            Message::Close(frame) => {
                return Err(Error::Connection(format!(
                    "closed during STOMP handshake: {}",
                    frame.map(|f| f.reason.to_string()).unwrap_or_default()
                )));
            }
            _ => continue,
        };
        let frames = Frame::decode_all(&text).map_err(|e| Error::Stomp(e.to_string()))?;
        for frame in frames {
            match frame.command {
                Command::Connected => {
                    debug!(version = ?frame.get("version"), "STOMP session established");
                    return Ok(frame.get("heart-beat").map(HeartBeat::parse).unwrap_or_default());
                }
                Command::Error => {
                    let reason = frame.get("message").unwrap_or("connection refused");
                    return Err(Error::Stomp(reason.to_string()));
                }
                other => trace!(command = %other, "Ignoring frame before CONNECTED"),
            }
        }
    }
    Err(Error::Connection("stream ended during STOMP handshake".into()))
}

#[async_trait]
impl PushTransport for StompTransport {
    async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to STOMP endpoint");
        self.drop_connection();
        self.pending.clear();

        let connect = Frame::connect(&self.host, self.token.as_deref(), self.heartbeat);
        let (ws, server_beat) = timeout(self.connect_timeout, async {
            let (mut ws, response) = connect_async(&self.url).await?;
            debug!(status = %response.status(), "WebSocket connected");
            let server_beat = handshake(&mut ws, &connect).await?;
            Ok::<_, Error>((ws, server_beat))
        })
        .await
        .map_err(|_| Error::Connection("STOMP connect timed out".into()))??;

        let (send_every, expect_within) = self.heartbeat.negotiate(server_beat);
        info!(
            send_every_ms = send_every.map(|d| d.as_millis() as u64),
            expect_within_ms = expect_within.map(|d| d.as_millis() as u64),
            "STOMP connected"
        );
        let now = Instant::now();
        self.ws = Some(ws);
        self.send_every = send_every;
        self.expect_within = expect_within;
        self.last_sent = now;
        self.last_received = now;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &Topic) -> Result<()> {
        if self.subscriptions.contains_key(topic) {
            return Ok(());
        }
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        self.send_frame(&Frame::subscribe(&id, topic.as_str())).await?;
        info!(topic = %topic, id = %id, "Subscribed");
        self.subscriptions.insert(topic.clone(), id);
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &Topic) -> Result<()> {
        let Some(id) = self.subscriptions.remove(topic) else {
            return Ok(());
        };
        if self.ws.is_some() {
            self.send_frame(&Frame::unsubscribe(&id)).await?;
        }
        info!(topic = %topic, id = %id, "Unsubscribed");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.ws.is_some() {
            if let Err(e) = self.send_frame(&Frame::disconnect()).await {
                debug!(error = %e, "DISCONNECT not delivered");
            }
        }
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!(error = %e, "WebSocket close failed");
            }
            info!("STOMP disconnected");
        }
        self.drop_connection();
        self.pending.clear();
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<PushFrame> {
        loop {
            if let Some(frame) = self.next_pending() {
                return Some(frame);
            }

            let beat_at = self.send_every.map(|every| self.last_sent + every);
            let silent_at = self
                .expect_within
                .map(|within| self.last_received + within * SILENCE_TOLERANCE);
            let now = Instant::now();
            let ws = self.ws.as_mut()?;

            let wake = tokio::select! {
                message = ws.next() => Wake::Incoming(message),
                () = sleep_until(beat_at.unwrap_or(now)), if beat_at.is_some() => Wake::Beat,
                () = sleep_until(silent_at.unwrap_or(now)), if silent_at.is_some() => Wake::Silent,
            };

            match wake {
                Wake::Incoming(None) => {
                    info!("WebSocket stream ended");
                    self.drop_connection();
                    return None;
                }
                Wake::Incoming(Some(Ok(message))) => {
                    self.last_received = Instant::now();
                    match message {
                        Message::Text(text) => {
                            trace!(bytes = text.len(), "Received WebSocket text frame");
                            self.absorb(&text);
                        }
                        Message::Binary(bytes) => self.absorb(&String::from_utf8_lossy(&bytes)),
                        Message::Ping(data) => {
                            trace!("Received WebSocket ping");
                            let pong = match self.ws.as_mut() {
                                Some(ws) => ws.send(Message::Pong(data)).await,
                                None => Ok(()),
                            };
                            if pong.is_err() {
                                self.drop_connection();
                                return Some(PushFrame::Disconnected {
                                    reason: "Failed to send pong".into(),
                                });
                            }
                        }
                        Message::Close(frame) => {
                            info!(frame = ?frame, "WebSocket closed by server");
                            self.drop_connection();
                            return Some(PushFrame::Disconnected {
                                reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                            });
                        }
                        _ => {}
                    }
                }
                Wake::Incoming(Some(Err(e))) => {
                    error!(error = %e, "WebSocket error");
                    self.drop_connection();
                    return Some(PushFrame::Disconnected {
                        reason: e.to_string(),
                    });
                }
                Wake::Beat => {
                    let sent = match self.ws.as_mut() {
                        Some(ws) => ws.send(Message::Text("\n".into())).await,
                        None => Ok(()),
                    };
                    if let Err(e) = sent {
                        self.drop_connection();
                        return Some(PushFrame::Disconnected {
                            reason: format!("heart-beat send failed: {e}"),
                        });
                    }
                    self.last_sent = Instant::now();
                }
                Wake::Silent => {
                    warn!("No data from server within heart-beat window");
                    self.drop_connection();
                    return Some(PushFrame::Disconnected {
                        reason: "heart-beat timeout".into(),
                    });
                }
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "stomp"
    }
}
