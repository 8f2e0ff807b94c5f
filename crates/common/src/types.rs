// Core domain types shared across the streamchat crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in a room's message feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Opaque id. History rows keep their server id; live events that
    /// arrive without one get a locally generated id instead.
    pub id: String,
    /// The stream id this message belongs to.
    pub room_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Display name, filled in lazily from whichever message first
    /// carried one for this author.
    pub author_name: Option<String>,
}

/// A persisted message row as returned by the chat history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: u64,
    pub stream_id: String,
    pub user_id: String,
    /// Empty when the service never learned a name for the author.
    #[serde(default)]
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The locally authenticated user. Used to label the user's own
/// messages even when the wire never carried their name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub display_name: Option<String>,
}
