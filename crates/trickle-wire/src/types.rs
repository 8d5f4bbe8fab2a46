use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incremental text delta carried by one streamed data frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub text: String,
}

/// One message returned by the polling endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollMessage {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of one poll response: the messages accumulated since the id the
/// client last reported, plus the completion flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<PollMessage>,
    #[serde(default)]
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_deserialization() {
        let chunk: StreamChunk = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(chunk.text, "hello");
    }

    #[test]
    fn test_poll_response_defaults() {
        let response: PollResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(response.success);
        assert!(response.messages.is_empty());
        assert!(!response.complete);
    }

    #[test]
    fn test_poll_message_optional_fields() {
        let message: PollMessage =
            serde_json::from_str(r#"{"id":7,"content":"hi"}"#).unwrap();
        assert_eq!(message.id, 7);
        assert_eq!(message.role, None);
        assert_eq!(message.created_at, None);
    }
}
