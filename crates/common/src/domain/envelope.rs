use crate::domain::result::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a message relative to the backend tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Client to backend
    In,
    /// Backend to client
    Out,
}

impl Direction {
    /// Subject token used when routing envelopes on the message topic
    pub fn subject_token(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("IN"),
            Direction::Out => f.write_str("OUT"),
        }
    }
}

/// Canonical unit of communication between connections and the backend.
///
/// Serializes to the flat wire shape
/// `{action, modelInterface, direction, connectionId, timestamp, userId, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub action: String,
    pub model_interface: String,
    pub direction: Direction,
    pub connection_id: String,
    /// Whole seconds since the unix epoch, as a decimal string
    pub timestamp: String,
    pub user_id: String,
    pub data: serde_json::Value,
}

/// Trait for publishing message envelopes to the message topic
///
/// Implementations should:
/// - Serialize the envelope as flat JSON
/// - Publish and wait for the broker to accept it
/// - Return `PublishError` if the broker rejects it, without retrying
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageEnvelopeProducer: Send + Sync {
    async fn publish(&self, envelope: &MessageEnvelope) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_envelope() -> MessageEnvelope {
        MessageEnvelope {
            action: "run".to_string(),
            model_interface: "langchain".to_string(),
            direction: Direction::In,
            connection_id: "c1".to_string(),
            timestamp: "1700000000".to_string(),
            user_id: "u1".to_string(),
            data: json!({"x": 1}),
        }
    }

    #[test]
    fn test_envelope_serializes_to_flat_camel_case_json() {
        let value = serde_json::to_value(sample_envelope()).unwrap();

        assert_eq!(
            value,
            json!({
                "action": "run",
                "modelInterface": "langchain",
                "direction": "IN",
                "connectionId": "c1",
                "timestamp": "1700000000",
                "userId": "u1",
                "data": {"x": 1}
            })
        );
    }

    #[test]
    fn test_outbound_envelope_deserializes() {
        let envelope: MessageEnvelope = serde_json::from_value(json!({
            "action": "final_response",
            "modelInterface": "langchain",
            "direction": "OUT",
            "connectionId": "c1",
            "timestamp": "1700000001",
            "userId": "u1",
            "data": {"content": "hello"}
        }))
        .unwrap();

        assert_eq!(envelope.direction, Direction::Out);
        assert_eq!(envelope.data["content"], "hello");
    }

    #[test]
    fn test_direction_tokens() {
        assert_eq!(Direction::In.subject_token(), "in");
        assert_eq!(Direction::Out.subject_token(), "out");
        assert_eq!(Direction::Out.to_string(), "OUT");
    }
}
