//! Per-user notification events pushed over the SSE stream
//!
//! Events are serialized as JSON with a `type` discriminator so that
//! clients can dispatch without knowing the full set.

use serde::{Deserialize, Serialize};

/// Events delivered to a single user's notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserEvent {
    /// Emitted once when the SSE stream is established
    ConnectionEstablished { user_id: u64, timestamp: i64 },

    /// Keep-alive marker, emitted every 60 seconds
    Heartbeat { timestamp: i64 },

    /// An open question's answer deadline elapsed without a submission
    QuestionTimeout {
        interview_id: String,
        question_index: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_tags() {
        let event = UserEvent::QuestionTimeout {
            interview_id: "iv-1".to_string(),
            question_index: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "question_timeout");
        assert_eq!(json["interview_id"], "iv-1");
        assert_eq!(json["question_index"], 3);
    }
}
