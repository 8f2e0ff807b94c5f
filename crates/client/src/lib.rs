// streamchat-client: the live-chat core.
//
// Two pieces do the real work: the connection manager (one WebSocket
// channel per room, bounded reconnection) and the feed reconciler
// (REST history merged with the live tail). Everything else here is
// plumbing around them: the history collaborator, the bearer-token
// session, config, and the session loop that ties them together.

pub mod config;
pub mod connection;
pub mod feed;
pub mod history;
pub mod http;
pub mod session;
