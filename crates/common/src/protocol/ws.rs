// Wire frames for the chat WebSocket.
//
// The chat service tags every frame with a `type` field. Live
// broadcasts are tagged `message`; after (re)connect the server
// replays the most recent persisted rows as `history` frames with the
// same payload shape. Anything that fails to match the schema is
// rejected at this boundary and dropped by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Close code for a deliberate client shutdown (RFC 6455 normal
/// closure). Never followed by a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the channel terminates without a close
/// handshake. Any code other than [`NORMAL_CLOSURE`] takes the
/// reconnect path.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close reason sent alongside [`NORMAL_CLOSURE`] on deliberate
/// client shutdown.
pub const CLIENT_DISCONNECT_REASON: &str = "client disconnect";

/// Server -> client frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Live broadcast of a message some client just sent.
    Message(WireMessage),
    /// Replay of a recent persisted row, sent after (re)connect.
    History(WireMessage),
}

/// Payload shared by `message` and `history` frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub content: String,
    /// Server-assigned send time, epoch seconds.
    pub timestamp: i64,
    /// Persisted row id, when the service included one on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// Client -> server frame. Sending content is the only thing a chat
/// client can do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundFrame {
    pub content: String,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse a raw text frame against the tagged schema.
pub fn parse_inbound(raw: &str) -> Result<InboundFrame, FrameError> {
    Ok(serde_json::from_str(raw)?)
}

/// Encode an outbound frame as a single JSON object.
pub fn encode_outbound(frame: &OutboundFrame) -> Result<String, FrameError> {
    Ok(serde_json::to_string(frame)?)
}
