use chrono::{DateTime, Utc};
use pairlink_common::id::{prefix, prefixed_ulid};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One entry in a session's append-only chat transcript.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: &str, content: &str, sender: Sender) -> Self {
        Self {
            id: prefixed_ulid(prefix::MESSAGE),
            session_id: session_id.to_string(),
            content: content.to_string(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_fields() {
        let message = ChatMessage::new("ses_1", "hello", Sender::User);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["sessionId"], "ses_1");
        assert_eq!(value["content"], "hello");
        assert_eq!(value["sender"], "user");
        assert!(value["id"].as_str().unwrap().starts_with("msg_"));
        assert!(value.get("timestamp").is_some());
    }
}
