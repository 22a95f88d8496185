//! Wire-format events exchanged with clients over the WebSocket.
//!
//! Frames are UTF-8 JSON objects; the `type` field selects the event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::{ChatMessage, Sender};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateSession,
    #[serde(rename_all = "camelCase")]
    JoinSession {
        connection_code: String,
    },
    SendMessage {
        content: String,
        sender: Sender,
    },
    WebrtcSignal {
        signal: Value,
    },
    DisconnectSession,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        session_id: String,
        connection_code: String,
    },
    #[serde(rename_all = "camelCase")]
    SessionJoined {
        session_id: String,
    },
    /// Sent to the host when the viewer joins. The event name predates the
    /// host/viewer terminology and is kept for protocol compatibility.
    #[serde(rename_all = "camelCase")]
    PhoneConnected {
        session_id: String,
    },
    MessageReceived {
        message: ChatMessage,
    },
    SessionDisconnected,
    WebrtcSignal {
        signal: Value,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_inbound_shapes() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"create_session"}"#).unwrap();
        assert!(matches!(event, ClientEvent::CreateSession));

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"join_session","connectionCode":"AB12C3"}"#).unwrap();
        match event {
            ClientEvent::JoinSession { connection_code } => assert_eq!(connection_code, "AB12C3"),
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"send_message","content":"hi","sender":"user"}"#)
                .unwrap();
        match event {
            ClientEvent::SendMessage { content, sender } => {
                assert_eq!(content, "hi");
                assert_eq!(sender, Sender::User);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"webrtc_signal","signal":{"sdp":"offer"}}"#).unwrap();
        match event {
            ClientEvent::WebrtcSignal { signal } => assert_eq!(signal["sdp"], "offer"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn rejects_unrecognized_type() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"nonsense"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn serializes_outbound_shapes() {
        let value = serde_json::to_value(ServerEvent::SessionCreated {
            session_id: "ses_1".to_string(),
            connection_code: "AB12C3".to_string(),
        })
        .unwrap();
        assert_eq!(value["type"], "session_created");
        assert_eq!(value["sessionId"], "ses_1");
        assert_eq!(value["connectionCode"], "AB12C3");

        let value = serde_json::to_value(ServerEvent::SessionDisconnected).unwrap();
        assert_eq!(value["type"], "session_disconnected");

        let value = serde_json::to_value(ServerEvent::PhoneConnected {
            session_id: "ses_1".to_string(),
        })
        .unwrap();
        assert_eq!(value["type"], "phone_connected");

        let value = serde_json::to_value(ServerEvent::MessageReceived {
            message: ChatMessage::new("ses_1", "hello", Sender::Ai),
        })
        .unwrap();
        assert_eq!(value["type"], "message_received");
        assert_eq!(value["message"]["sender"], "ai");
    }
}
