// streamchat-common: shared types and the chat wire protocol.

pub mod protocol;
pub mod types;
