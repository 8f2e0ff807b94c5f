// Message reconciliation: one ordered, deduplicated feed per room.
//
// A feed is seeded once from the REST history snapshot and then only
// appended to by live events. All mutation happens on the session
// loop's single logical thread, so no locking is needed. The author
// cache maps author id to display name, filled from whichever message
// first supplies a name, and lives exactly as long as the feed.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use streamchat_common::types::{ChatMessage, CurrentUser, StoredMessage};

use crate::connection::LiveMessage;

/// Fallback label width: leading characters of the author id.
const AUTHOR_ID_PREFIX_LEN: usize = 8;

pub struct ChatFeed {
    room_id: String,
    current_user: Option<CurrentUser>,
    messages: Vec<ChatMessage>,
    /// Author display names, first writer wins. Read-only for
    /// `resolve_display_name`; written only while loading or
    /// appending.
    authors: HashMap<String, String>,
    /// Wire ids already in the feed. The server replays recent rows
    /// over the socket after a reconnect, so overlap with history is
    /// real, not theoretical.
    seen_ids: HashSet<u64>,
    next_local_id: u64,
}

impl ChatFeed {
    pub fn new(room_id: impl Into<String>, current_user: Option<CurrentUser>) -> Self {
        Self {
            room_id: room_id.into(),
            current_user,
            messages: Vec::new(),
            authors: HashMap::new(),
            seen_ids: HashSet::new(),
            next_local_id: 0,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cached_author_name(&self, author_id: &str) -> Option<&str> {
        self.authors.get(author_id).map(String::as_str)
    }

    /// Seed the feed from the REST history snapshot, replacing
    /// whatever it held.
    ///
    /// Rows are sorted ascending by `created_at`; the sort is stable,
    /// so ties keep their fetch order. Any row carrying a name seeds
    /// the author cache.
    pub fn load_history(&mut self, mut rows: Vec<StoredMessage>) {
        rows.sort_by_key(|row| row.created_at);

        self.messages.clear();
        self.seen_ids.clear();
        for row in rows {
            let author_name =
                if row.username.is_empty() { None } else { Some(row.username) };
            if let Some(name) = &author_name {
                self.authors.entry(row.user_id.clone()).or_insert_with(|| name.clone());
            }
            self.seen_ids.insert(row.id);
            self.messages.push(ChatMessage {
                id: row.id.to_string(),
                room_id: self.room_id.clone(),
                author_id: row.user_id,
                content: row.content,
                created_at: row.created_at,
                author_name,
            });
        }
    }

    /// Append one live event at the tail, without re-sorting.
    ///
    /// Live events are trusted to arrive in server-send order. Events
    /// whose wire id was already observed (history rows replayed over
    /// the socket) are skipped. Returns the appended message, or None
    /// when the event was a duplicate.
    pub fn append_live(&mut self, event: LiveMessage) -> Option<&ChatMessage> {
        if let Some(wire_id) = event.wire_id {
            if !self.seen_ids.insert(wire_id) {
                debug!(wire_id, room = %self.room_id, "skipping duplicate live event");
                return None;
            }
        }

        let id = match event.wire_id {
            Some(wire_id) => wire_id.to_string(),
            None => {
                self.next_local_id += 1;
                format!("local-{}", self.next_local_id)
            }
        };

        // The local user's own id resolves to their own known name
        // even when the event omits it.
        let author_name = event.author_name.or_else(|| self.own_name_for(&event.author_id));
        if let Some(name) = &author_name {
            self.authors.entry(event.author_id.clone()).or_insert_with(|| name.clone());
        }

        self.messages.push(ChatMessage {
            id,
            room_id: self.room_id.clone(),
            author_id: event.author_id,
            content: event.content,
            created_at: event.sent_at,
            author_name,
        });
        self.messages.last()
    }

    /// Resolve the name to show for a message.
    ///
    /// Priority: the local user's own name, then the cached name,
    /// then a label derived from the author id. Pure read; the cache
    /// is written only by `load_history` and `append_live`.
    pub fn resolve_display_name(&self, message: &ChatMessage) -> String {
        if let Some(user) = &self.current_user {
            if user.id == message.author_id {
                return user.display_name.clone().unwrap_or_else(|| "You".to_owned());
            }
        }
        if let Some(name) = self.authors.get(&message.author_id) {
            return name.clone();
        }
        let prefix: String = message.author_id.chars().take(AUTHOR_ID_PREFIX_LEN).collect();
        format!("User {prefix}...")
    }

    fn own_name_for(&self, author_id: &str) -> Option<String> {
        self.current_user
            .as_ref()
            .filter(|user| user.id == author_id)
            .and_then(|user| user.display_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn stored(id: u64, user_id: &str, username: &str, content: &str, secs: i64) -> StoredMessage {
        StoredMessage {
            id,
            stream_id: "stream-1".to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            content: content.to_string(),
            created_at: at(secs),
        }
    }

    fn live(user_id: &str, content: &str, secs: i64) -> LiveMessage {
        LiveMessage {
            wire_id: None,
            author_id: user_id.to_string(),
            author_name: None,
            content: content.to_string(),
            sent_at: at(secs),
        }
    }

    fn feed() -> ChatFeed {
        ChatFeed::new("stream-1", None)
    }

    // ── History loading ─────────────────────────────────────────────

    #[test]
    fn history_is_sorted_ascending_by_created_at() {
        let mut feed = feed();
        feed.load_history(vec![
            stored(2, "u1", "", "late", 1_700_000_002),
            stored(1, "u1", "", "early", 1_700_000_000),
        ]);

        let contents: Vec<_> = feed.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["early", "late"]);
        assert!(feed
            .messages()
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[test]
    fn history_sort_is_stable_for_equal_timestamps() {
        let mut feed = feed();
        feed.load_history(vec![
            stored(1, "u1", "", "first", 1_700_000_000),
            stored(2, "u2", "", "second", 1_700_000_000),
        ]);

        let contents: Vec<_> = feed.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
    }

    #[test]
    fn empty_history_is_a_valid_state() {
        let mut feed = feed();
        feed.load_history(Vec::new());
        assert!(feed.is_empty());
    }

    #[test]
    fn history_seeds_the_author_cache() {
        let mut feed = feed();
        feed.load_history(vec![
            stored(1, "u1", "Alice", "hi", 1),
            stored(2, "u2", "", "anon", 2),
        ]);

        assert_eq!(feed.cached_author_name("u1"), Some("Alice"));
        assert_eq!(feed.cached_author_name("u2"), None);
    }

    #[test]
    fn first_cached_name_wins() {
        let mut feed = feed();
        feed.load_history(vec![
            stored(1, "u1", "Alice", "hi", 1),
            stored(2, "u1", "Renamed", "later", 2),
        ]);
        assert_eq!(feed.cached_author_name("u1"), Some("Alice"));
    }

    // ── Live appends ────────────────────────────────────────────────

    #[test]
    fn live_events_append_at_the_tail_without_reordering() {
        let mut feed = feed();
        feed.load_history(vec![stored(1, "u1", "", "old", 1_700_000_000)]);

        feed.append_live(live("u2", "new", 1_700_000_005));
        let appended = feed.messages().last().unwrap();
        assert_eq!(appended.content, "new");
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.messages()[0].content, "old");
    }

    #[test]
    fn live_event_without_wire_id_gets_a_local_monotonic_id() {
        let mut feed = feed();
        feed.append_live(live("u1", "a", 1));
        feed.append_live(live("u1", "b", 2));

        let ids: Vec<_> = feed.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["local-1", "local-2"]);
    }

    #[test]
    fn live_event_timestamp_is_the_converted_epoch_value() {
        let mut feed = feed();
        feed.append_live(live("u1", "hi", 1_700_000_000));
        assert_eq!(feed.messages()[0].created_at, at(1_700_000_000));
    }

    #[test]
    fn replayed_history_row_is_deduplicated_by_wire_id() {
        let mut feed = feed();
        feed.load_history(vec![stored(7, "u1", "", "already here", 1)]);

        let replay = LiveMessage { wire_id: Some(7), ..live("u1", "already here", 1) };
        assert!(feed.append_live(replay).is_none());
        assert_eq!(feed.len(), 1);

        // A fresh wire id still appends.
        let fresh = LiveMessage { wire_id: Some(8), ..live("u1", "brand new", 2) };
        assert!(feed.append_live(fresh).is_some());
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn live_event_with_a_name_populates_the_cache() {
        let mut feed = feed();
        let event = LiveMessage {
            author_name: Some("Bob".to_string()),
            ..live("u9", "hello", 1)
        };
        feed.append_live(event);
        assert_eq!(feed.cached_author_name("u9"), Some("Bob"));
    }

    #[test]
    fn own_message_without_a_name_resolves_to_own_name() {
        let user = CurrentUser { id: "me".to_string(), display_name: Some("Me Myself".to_string()) };
        let mut feed = ChatFeed::new("stream-1", Some(user));

        feed.append_live(live("me", "mine", 1));
        assert_eq!(feed.cached_author_name("me"), Some("Me Myself"));
        assert_eq!(feed.messages()[0].author_name.as_deref(), Some("Me Myself"));
    }

    // ── Display name resolution ─────────────────────────────────────

    #[test]
    fn current_user_resolves_to_their_own_name() {
        let user = CurrentUser { id: "me".to_string(), display_name: Some("Me Myself".to_string()) };
        let mut feed = ChatFeed::new("stream-1", Some(user));
        feed.append_live(live("me", "mine", 1));

        let message = &feed.messages()[0];
        assert_eq!(feed.resolve_display_name(message), "Me Myself");
    }

    #[test]
    fn current_user_without_a_name_resolves_to_the_self_label() {
        let user = CurrentUser { id: "me".to_string(), display_name: None };
        let mut feed = ChatFeed::new("stream-1", Some(user));
        feed.append_live(live("me", "mine", 1));

        let message = &feed.messages()[0];
        assert_eq!(feed.resolve_display_name(message), "You");
    }

    #[test]
    fn cached_names_beat_the_fallback_label() {
        let mut feed = feed();
        feed.load_history(vec![stored(1, "u1", "Alice", "hi", 1)]);
        feed.append_live(live("u1", "again", 2));

        let message = feed.messages().last().unwrap();
        assert_eq!(feed.resolve_display_name(message), "Alice");
    }

    #[test]
    fn unknown_author_falls_back_to_a_truncated_id_label() {
        let mut feed = feed();
        feed.append_live(live("0123456789abcdef", "hi", 1));

        let message = &feed.messages()[0];
        assert_eq!(feed.resolve_display_name(message), "User 01234567...");
    }

    #[test]
    fn resolution_never_mutates_the_cache() {
        let mut feed = feed();
        feed.append_live(live("u1", "hi", 1));
        let message = feed.messages()[0].clone();

        feed.resolve_display_name(&message);
        assert_eq!(feed.cached_author_name("u1"), None);
    }
}
