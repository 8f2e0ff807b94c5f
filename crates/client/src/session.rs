// Room session: drives one room's history fetch, channel lifecycle,
// and feed updates on a single logical task.
//
// All feed mutation happens here, in event order. Consumers observe
// the session through the `RoomEvent` channel; each event is emitted
// only after the corresponding feed state is in place.

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use streamchat_common::types::{ChatMessage, CurrentUser};

use crate::connection::{ChatConnection, ChatEvent, ChatTransport, RoomConfig};
use crate::feed::ChatFeed;
use crate::history::HistoryStore;

/// A feed message paired with its resolved display name.
///
/// Resolution happens at append time, so the name reflects the author
/// cache as of the moment the message landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub message: ChatMessage,
    pub display_name: String,
}

/// Events emitted by a running session, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The history fetch settled. Empty when the fetch failed.
    HistoryLoaded { entries: Vec<FeedEntry> },
    /// A live message was appended to the feed tail.
    Appended(FeedEntry),
    /// The channel is open.
    Connected,
    /// The channel was lost; a redial is scheduled.
    Reconnecting { attempt: u32 },
    /// The session is over. `error` is set when retries were
    /// exhausted, None on a deliberate close.
    Ended { error: Option<String> },
    /// An outbound message was dropped because the channel was not
    /// open. Nothing is queued; the caller may resend later.
    SendRejected { content: String },
}

/// One room's chat session: connection manager plus feed.
pub struct RoomSession<T: ChatTransport, H: HistoryStore> {
    conn: ChatConnection<T>,
    feed: ChatFeed,
    history: H,
}

impl<T: ChatTransport, H: HistoryStore> RoomSession<T, H> {
    pub fn new(
        config: RoomConfig,
        transport: T,
        history: H,
        current_user: Option<CurrentUser>,
    ) -> Self {
        let feed = ChatFeed::new(config.room_id.clone(), current_user);
        Self { conn: ChatConnection::new(config, transport), feed, history }
    }

    /// Run the session to completion.
    ///
    /// Fetches history, dials the channel, then loops: forwarding
    /// outbox messages, appending inbound ones, and redialing after
    /// abnormal closes until the retry budget is spent. Returns the
    /// final feed so callers can inspect it after shutdown.
    ///
    /// Flipping `shutdown` to true closes the channel deliberately
    /// and cancels any pending reconnect timer.
    pub async fn run(
        mut self,
        mut outbox: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<RoomEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<ChatFeed> {
        self.load_history(&events).await;

        let mut event = self.conn.connect().await?;
        loop {
            match event {
                ChatEvent::Open => {
                    let _ = events.send(RoomEvent::Connected);
                }
                ChatEvent::Message(live) | ChatEvent::Replay(live) => {
                    let appended = self.feed.append_live(live).cloned();
                    if let Some(message) = appended {
                        let _ = events.send(RoomEvent::Appended(self.entry(message)));
                    }
                }
                ChatEvent::Closed { code, reason } => {
                    debug!(code, %reason, "session over: channel closed deliberately");
                    let _ = events.send(RoomEvent::Ended { error: None });
                    return Ok(self.feed);
                }
                ChatEvent::Failed { error } => {
                    let _ = events.send(RoomEvent::Ended { error: Some(error) });
                    return Ok(self.feed);
                }
                ChatEvent::Reconnecting { attempt, .. } => {
                    let _ = events.send(RoomEvent::Reconnecting { attempt });
                    if !self.wait_retry(&mut shutdown).await {
                        self.conn.disconnect().await;
                        let _ = events.send(RoomEvent::Ended { error: None });
                        return Ok(self.feed);
                    }
                    event = self.conn.connect().await?;
                    continue;
                }
            }

            // Channel is open: multiplex shutdown, outbox, and inbound
            // traffic until the next lifecycle transition.
            event = 'traffic: loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        self.conn.disconnect().await;
                        let _ = events.send(RoomEvent::Ended { error: None });
                        return Ok(self.feed);
                    }
                    outgoing = outbox.recv() => {
                        match outgoing {
                            Some(content) => {
                                if !self.conn.send(&content).await {
                                    let _ = events.send(RoomEvent::SendRejected { content });
                                }
                            }
                            None => {
                                // Outbox dropped: the caller is gone.
                                self.conn.disconnect().await;
                                let _ = events.send(RoomEvent::Ended { error: None });
                                return Ok(self.feed);
                            }
                        }
                    }
                    received = self.conn.recv_event() => {
                        break 'traffic received?;
                    }
                }
            };
        }
    }

    async fn load_history(&mut self, events: &mpsc::UnboundedSender<RoomEvent>) {
        match self.history.fetch_messages(self.feed.room_id()).await {
            Ok(rows) => {
                debug!(count = rows.len(), "history loaded");
                self.feed.load_history(rows);
            }
            Err(error) => {
                // An empty feed is better than no feed; live traffic
                // still flows.
                warn!(error = %format!("{error:#}"), "history fetch failed, starting empty");
            }
        }
        let entries = self
            .feed
            .messages()
            .iter()
            .map(|message| self.entry(message.clone()))
            .collect();
        let _ = events.send(RoomEvent::HistoryLoaded { entries });
    }

    /// Sleep out the retry delay. Returns false if shutdown was
    /// requested, cancelling the pending redial.
    async fn wait_retry(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.conn.retry_delay()) => true,
            _ = shutdown.changed() => false,
        }
    }

    fn entry(&self, message: ChatMessage) -> FeedEntry {
        let display_name = self.feed.resolve_display_name(&message);
        FeedEntry { message, display_name }
    }
}
