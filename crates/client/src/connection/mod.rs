// Chat connection manager: WebSocket client with bounded reconnection.
//
// Owns at most one live channel per room. A deliberate close (code
// 1000) is terminal; any other termination takes the retry path, with
// a fixed delay between strictly sequential attempts, until the retry
// budget is spent and the connection is marked failed.
//
// Transport is abstracted via `ChatTransport` for testability. The
// tokio-tungstenite implementation lives in `ws`.

pub mod ws;

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use streamchat_common::protocol::ws::{
    encode_outbound, parse_inbound, InboundFrame, OutboundFrame, WireMessage, ABNORMAL_CLOSURE,
    CLIENT_DISCONNECT_REASON, NORMAL_CLOSURE,
};

/// Abnormal closes tolerated before the connection is marked failed.
pub const MAX_RETRIES: u32 = 5;

/// Fixed delay between reconnection attempts. Deliberately not
/// exponential: the UI promises a retry every few seconds.
pub const RETRY_DELAY: Duration = Duration::from_millis(3000);

const CONNECTION_LOST: &str = "connection lost";

// ── Configuration ───────────────────────────────────────────────────

/// Connection parameters for one chat room.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// WebSocket base URL (e.g. "wss://chat.example.com").
    pub ws_url: String,
    /// Stream id identifying the room.
    pub room_id: String,
    /// Bearer token, folded into the channel URL as a query parameter.
    pub auth_token: String,
}

impl RoomConfig {
    /// Channel address: room id in the path, token in the query.
    pub fn channel_url(&self) -> Result<Url> {
        let base = self.ws_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/ws/chat/{}", self.room_id))
            .map_err(|error| anyhow!("invalid ws_url `{}`: {error}", self.ws_url))?;
        validate_ws_url(&url)?;
        url.query_pairs_mut().append_pair("token", &self.auth_token);
        Ok(url)
    }
}

fn validate_ws_url(url: &Url) -> Result<()> {
    match url.scheme() {
        "wss" => Ok(()),
        "ws" if is_loopback_host(url.host_str()) => Ok(()),
        _ => Err(anyhow!("ws_url must use wss (ws is allowed only for localhost testing)")),
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    let Some(host) = host else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|addr| addr.is_loopback())
}

// ── Transport trait ─────────────────────────────────────────────────

/// A transport-level event read from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text frame, not yet validated against the wire schema.
    Text(String),
    /// The peer closed the channel.
    Closed { code: u16, reason: String },
}

/// Abstraction over the WebSocket transport for testability.
///
/// Production uses tokio-tungstenite (`ws::WsTransport`); tests use a
/// scripted mock.
#[allow(async_fn_in_trait)]
pub trait ChatTransport {
    /// Open the channel. Failures take the same path as an abnormal
    /// close.
    async fn connect(&mut self, url: &Url) -> Result<()>;

    /// Write one text frame.
    async fn send(&mut self, payload: String) -> Result<()>;

    /// Read the next transport event. An error here means the channel
    /// died without a close handshake.
    async fn recv(&mut self) -> Result<Incoming>;

    /// Close the channel with the given code and reason.
    async fn close(&mut self, code: u16, reason: &str);
}

// ── Connection state ────────────────────────────────────────────────

/// Lifecycle state of a room's channel.
///
/// `Closed` (deliberate shutdown) and `Failed` (retries exhausted)
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Reconnecting,
    Failed,
}

// ── Events ──────────────────────────────────────────────────────────

/// Events surfaced to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Channel opened; the retry counter was reset.
    Open,
    /// A live broadcast message.
    Message(LiveMessage),
    /// A history row replayed over the socket after (re)connect.
    Replay(LiveMessage),
    /// Deliberate closure. Terminal.
    Closed { code: u16, reason: String },
    /// Abnormal closure; redial after [`RETRY_DELAY`].
    Reconnecting { attempt: u32, reason: String },
    /// Retry budget spent. Terminal.
    Failed { error: String },
}

/// An inbound message event, normalized from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMessage {
    /// Persisted row id, when the wire carried one.
    pub wire_id: Option<u64>,
    pub author_id: String,
    pub author_name: Option<String>,
    pub content: String,
    /// Server-assigned send time, converted from epoch seconds.
    pub sent_at: DateTime<Utc>,
}

impl LiveMessage {
    /// Normalize a wire payload. Returns None when the timestamp is
    /// outside the representable range.
    fn from_wire(msg: WireMessage) -> Option<Self> {
        let sent_at = DateTime::from_timestamp(msg.timestamp, 0)?;
        Some(Self {
            wire_id: msg.id,
            author_id: msg.user_id,
            author_name: msg.username.filter(|name| !name.is_empty()),
            content: msg.content,
            sent_at,
        })
    }
}

// ── Connection manager ──────────────────────────────────────────────

/// Manages one room's channel lifecycle.
pub struct ChatConnection<T: ChatTransport> {
    config: RoomConfig,
    transport: T,
    state: ConnectionState,
    retry_count: u32,
    /// User-visible error, set when the connection degrades for good.
    last_error: Option<String>,
}

impl<T: ChatTransport> ChatConnection<T> {
    pub fn new(config: RoomConfig, transport: T) -> Self {
        // A room mounts straight into its first dial.
        Self {
            config,
            transport,
            state: ConnectionState::Connecting,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Delay before the next reconnect attempt. Fixed, not backoff.
    pub fn retry_delay(&self) -> Duration {
        RETRY_DELAY
    }

    /// Whether the session loop should schedule another dial.
    pub fn should_reconnect(&self) -> bool {
        self.state == ConnectionState::Reconnecting
    }

    /// Dial the channel.
    ///
    /// On success the state moves to `Open` and the retry counter
    /// resets. A dial failure is handled exactly like an abnormal
    /// close; no error escapes.
    pub async fn connect(&mut self) -> Result<ChatEvent> {
        let url = self.config.channel_url()?;
        self.state = ConnectionState::Connecting;
        debug!(room = %self.config.room_id, "dialing chat channel");

        match self.transport.connect(&url).await {
            Ok(()) => {
                self.state = ConnectionState::Open;
                self.retry_count = 0;
                self.last_error = None;
                debug!(room = %self.config.room_id, "chat channel open");
                Ok(ChatEvent::Open)
            }
            Err(error) => {
                Ok(self.register_close(ABNORMAL_CLOSURE, format!("connect failed: {error:#}")))
            }
        }
    }

    /// Read and normalize the next event from an open channel.
    ///
    /// Malformed payloads are dropped (logged) and reading continues;
    /// transport errors and close frames resolve to a close
    /// transition, never an escaped error.
    pub async fn recv_event(&mut self) -> Result<ChatEvent> {
        if self.state != ConnectionState::Open {
            return Err(anyhow!("cannot receive: channel is not open"));
        }

        loop {
            match self.transport.recv().await {
                Ok(Incoming::Text(raw)) => match parse_inbound(&raw) {
                    Ok(InboundFrame::Message(msg)) => match LiveMessage::from_wire(msg) {
                        Some(live) => return Ok(ChatEvent::Message(live)),
                        None => warn!("dropping frame with out-of-range timestamp"),
                    },
                    Ok(InboundFrame::History(msg)) => match LiveMessage::from_wire(msg) {
                        Some(live) => return Ok(ChatEvent::Replay(live)),
                        None => warn!("dropping frame with out-of-range timestamp"),
                    },
                    Err(error) => warn!(%error, "dropping malformed frame"),
                },
                Ok(Incoming::Closed { code, reason }) => {
                    return Ok(self.register_close(code, reason));
                }
                Err(error) => {
                    return Ok(self.register_close(ABNORMAL_CLOSURE, format!("{error:#}")));
                }
            }
        }
    }

    /// Write one `{content}` frame.
    ///
    /// Returns false without writing unless the channel is open;
    /// nothing is queued while disconnected, the caller must retry.
    pub async fn send(&mut self, content: &str) -> bool {
        if self.state != ConnectionState::Open {
            debug!(state = ?self.state, "send rejected: channel is not open");
            return false;
        }
        let frame = OutboundFrame { content: content.to_owned() };
        let payload = match encode_outbound(&frame) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to encode outbound frame");
                return false;
            }
        };
        match self.transport.send(payload).await {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "send failed");
                false
            }
        }
    }

    /// Close deliberately. Idempotent, terminal, never followed by a
    /// reconnect. Safe to call when no channel is open.
    pub async fn disconnect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Reconnecting
        ) {
            self.transport.close(NORMAL_CLOSURE, CLIENT_DISCONNECT_REASON).await;
        }
        self.state = ConnectionState::Closed;
    }

    fn register_close(&mut self, code: u16, reason: String) -> ChatEvent {
        self.state = ConnectionState::Closed;

        if code == NORMAL_CLOSURE {
            debug!(code, %reason, "channel closed deliberately");
            return ChatEvent::Closed { code, reason };
        }

        self.retry_count += 1;
        if self.retry_count < MAX_RETRIES {
            self.state = ConnectionState::Reconnecting;
            warn!(
                attempt = self.retry_count,
                max = MAX_RETRIES,
                %reason,
                "channel lost, reconnect scheduled"
            );
            ChatEvent::Reconnecting { attempt: self.retry_count, reason }
        } else {
            self.state = ConnectionState::Failed;
            warn!(%reason, "retry budget spent, giving up");
            let error = CONNECTION_LOST.to_owned();
            self.last_error = Some(error.clone());
            ChatEvent::Failed { error }
        }
    }
}
