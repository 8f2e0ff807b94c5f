// Contract tests pinning the exact wire shapes the chat service speaks.

use streamchat_common::protocol::ws::{
    encode_outbound, parse_inbound, InboundFrame, OutboundFrame, WireMessage,
    CLIENT_DISCONNECT_REASON, NORMAL_CLOSURE,
};

#[test]
fn outbound_wire_shape_is_stable() {
    let frame = OutboundFrame { content: "gg wp".into() };
    assert_eq!(encode_outbound(&frame).unwrap(), r#"{"content":"gg wp"}"#);
}

#[test]
fn inbound_message_round_trips_through_the_tagged_schema() {
    let frame = InboundFrame::Message(WireMessage {
        user_id: "5f3c9a2b".into(),
        username: Some("Streamer".into()),
        content: "welcome to the stream".into(),
        timestamp: 1_700_000_000,
        id: None,
    });
    let encoded = serde_json::to_string(&frame).unwrap();
    assert!(encoded.starts_with(r#"{"type":"message""#));
    assert_eq!(parse_inbound(&encoded).unwrap(), frame);
}

#[test]
fn inbound_history_round_trips_through_the_tagged_schema() {
    let frame = InboundFrame::History(WireMessage {
        user_id: "5f3c9a2b".into(),
        username: None,
        content: "earlier message".into(),
        timestamp: 1_699_999_000,
        id: Some(7),
    });
    let encoded = serde_json::to_string(&frame).unwrap();
    assert!(encoded.starts_with(r#"{"type":"history""#));
    assert_eq!(parse_inbound(&encoded).unwrap(), frame);
}

#[test]
fn deliberate_close_constants_match_the_service_contract() {
    assert_eq!(NORMAL_CLOSURE, 1000);
    assert_eq!(CLIENT_DISCONNECT_REASON, "client disconnect");
}
