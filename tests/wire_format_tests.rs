use echolink::nats::messages::{SignalMessage, TranscriptMessage};
use echolink::transcript::{Sender, SideChannelMessage, TranscriptItem};

fn item(id: &str, text: &str, is_final: bool) -> TranscriptItem {
    TranscriptItem {
        id: id.to_string(),
        sender: Sender::Local,
        text: text.to_string(),
        is_final,
        timestamp: 1_730_000_000_000,
    }
}

#[test]
fn test_transcript_message_serialization() {
    let msg = SideChannelMessage::Transcript(item("1730000000000-a1b2c3d4-0", "hello team", false));

    let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
    assert_eq!(json["kind"], "TRANSCRIPT");
    assert_eq!(json["payload"]["id"], "1730000000000-a1b2c3d4-0");
    assert_eq!(json["payload"]["sender"], "local");
    assert_eq!(json["payload"]["text"], "hello team");
    assert_eq!(json["payload"]["isFinal"], false);
    assert_eq!(json["payload"]["timestamp"], 1_730_000_000_000i64);
}

#[test]
fn test_chat_message_kind() {
    let msg = SideChannelMessage::Chat(item("c-1", "typed line", true));

    let json = String::from_utf8(msg.encode().unwrap()).unwrap();
    assert!(json.contains("\"kind\":\"CHAT\""));
    assert_eq!(msg.kind(), "CHAT");
}

#[test]
fn test_decode_peer_payload() {
    let json = r#"{
        "kind": "TRANSCRIPT",
        "payload": {
            "id": "42-ffff0000-3",
            "sender": "remote",
            "text": "from the other side",
            "isFinal": true,
            "timestamp": 42
        }
    }"#;

    let msg = SideChannelMessage::decode(json.as_bytes()).unwrap();
    let decoded = msg.into_item();
    assert_eq!(decoded.id, "42-ffff0000-3");
    assert_eq!(decoded.sender, Sender::Remote);
    assert!(decoded.is_final);
    assert_eq!(decoded.timestamp, 42);
}

#[test]
fn test_decode_rejects_unknown_kind() {
    let json = r#"{"kind": "FILE", "payload": {}}"#;
    assert!(SideChannelMessage::decode(json.as_bytes()).is_err());
}

#[test]
fn test_signal_message_tagging() {
    let msg = SignalMessage::Call {
        call_id: "c-7".to_string(),
        from: "guest-1".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"call\""));
    assert!(json.contains("\"call_id\":\"c-7\""));

    let deserialized: SignalMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, msg);
    assert_eq!(deserialized.from_id(), "guest-1");
}

#[test]
fn test_signal_data_carries_side_channel_json() {
    let inner = SideChannelMessage::Transcript(item("1-aa-0", "hi", true));
    let payload = String::from_utf8(inner.encode().unwrap()).unwrap();
    let msg = SignalMessage::Data {
        from: "4821".to_string(),
        payload,
    };

    let json = serde_json::to_string(&msg).unwrap();
    let SignalMessage::Data { payload, .. } = serde_json::from_str(&json).unwrap() else {
        panic!("expected data frame");
    };
    assert_eq!(SideChannelMessage::decode(payload.as_bytes()).unwrap(), inner);
}

#[test]
fn test_transcript_deserialization() {
    let json = r#"{
        "session_id": "4821",
        "text": "Hello world",
        "partial": false,
        "timestamp": "2025-10-27T14:30:05Z",
        "confidence": 0.95
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.session_id, "4821");
    assert_eq!(msg.text, "Hello world");
    assert!(!msg.partial);
    assert_eq!(msg.confidence, Some(0.95));
}

#[test]
fn test_transcript_no_confidence() {
    let json = r#"{
        "session_id": "4821",
        "text": "This is a partial",
        "partial": true,
        "timestamp": "2025-10-27T14:30:05Z"
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert!(msg.partial);
    assert_eq!(msg.confidence, None);
}
