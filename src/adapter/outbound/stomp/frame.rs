//! STOMP 1.2 frame codec.
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! Header values are escaped (`\\`, `\n`, `\r`, `\c`) except in `CONNECT`
//! and `CONNECTED` frames. A frame made of line endings only is a heart-beat.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Send => "SEND",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "SEND" => Self::Send,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            _ => return None,
        })
    }

    /// Connection frames carry raw header values.
    const fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("header line without ':': '{0}'")]
    MalformedHeader(String),

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    #[error("frame has no header terminator")]
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`; repeated headers keep the first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `CONNECT` with bearer auth and a heart-beat offer.
    pub fn connect(host: &str, token: Option<&str>, heartbeat: HeartBeat) -> Self {
        let mut frame = Self::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", heartbeat.to_string());
        if let Some(token) = token {
            frame = frame.header("Authorization", format!("Bearer {token}"));
        }
        frame
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Wire form, NUL terminated.
    #[must_use]
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_value(name));
                out.push(':');
                out.push_str(&escape_value(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode every frame in `raw`. Heart-beats yield nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] for the first malformed frame.
    pub fn decode_all(raw: &str) -> Result<Vec<Self>, FrameError> {
        raw.split('\0')
            .filter_map(|chunk| Self::decode(chunk).transpose())
            .collect()
    }

    /// Decode one frame (without its NUL). `Ok(None)` for a heart-beat.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the frame is malformed.
    pub fn decode(raw: &str) -> Result<Option<Self>, FrameError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() {
            return Ok(None);
        }

        let (head, body) = split_head(raw).ok_or(FrameError::Truncated)?;
        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
        let command = Command::parse(command_line)
            .ok_or_else(|| FrameError::UnknownCommand(command_line.to_string()))?;

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if command.escapes_headers() {
                headers.push((unescape_value(name)?, unescape_value(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Self {
            command,
            headers,
            body: body.to_string(),
        };
        if let Some(len) = frame.get("content-length").and_then(|l| l.parse::<usize>().ok()) {
            if len <= frame.body.len() && frame.body.is_char_boundary(len) {
                frame.body.truncate(len);
            }
        }
        Ok(Some(frame))
    }
}

/// Split at the blank line ending the headers.
fn split_head(raw: &str) -> Option<(&str, &str)> {
    let lf = raw.find("\n\n").map(|i| (i, 2));
    let crlf = raw.find("\r\n\r\n").map(|i| (i, 4));
    let (at, len) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 < b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        // Frames without headers or body may end right after the command.
        (None, None) => {
            let trimmed = raw.trim_end_matches(['\r', '\n']);
            return (!trimmed.contains('\n')).then_some((trimmed, ""));
        }
    };
    Some((&raw[..at], &raw[at + len..]))
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_value(value: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(FrameError::InvalidEscape(other)),
            None => return Err(FrameError::InvalidEscape(' ')),
        }
    }
    Ok(out)
}

/// `heart-beat` header value: `cx,cy` in milliseconds, 0 meaning "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which the sender can send beats.
    pub outgoing_ms: u32,
    /// Desired interval at which the sender wants to receive beats.
    pub incoming_ms: u32,
}

impl HeartBeat {
    pub const fn new(outgoing_ms: u32, incoming_ms: u32) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    /// Parse `"cx,cy"`; anything unparsable means no heart-beats.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(',').map(|p| p.trim().parse::<u32>().unwrap_or(0));
        Self {
            outgoing_ms: parts.next().unwrap_or(0),
            incoming_ms: parts.next().unwrap_or(0),
        }
    }

    /// Negotiated `(send every, expect within)` for a client offering `self`
    /// to a server answering `server`.
    #[must_use]
    pub fn negotiate(self, server: Self) -> (Option<Duration>, Option<Duration>) {
        let send = (self.outgoing_ms != 0 && server.incoming_ms != 0)
            .then(|| Duration::from_millis(u64::from(self.outgoing_ms.max(server.incoming_ms))));
        let receive = (self.incoming_ms != 0 && server.outgoing_ms != 0)
            .then(|| Duration::from_millis(u64::from(self.incoming_ms.max(server.outgoing_ms))));
        (send, receive)
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing_ms, self.incoming_ms)
    }
}
