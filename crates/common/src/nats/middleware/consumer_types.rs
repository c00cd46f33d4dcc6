use async_nats::HeaderMap;
use bytes::Bytes;

/// Owned copy of a consumed JetStream message.
///
/// Decoupled from `async_nats::jetstream::Message` so processors and Tower
/// services can be exercised without a live NATS connection.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub subject: String,
    pub payload: Bytes,
    /// Carries the publisher's trace context
    pub headers: Option<HeaderMap>,
    /// Stream sequence of the message, 0 when unknown
    pub sequence: u64,
}

impl ConsumeRequest {
    pub fn new(subject: String, payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Self {
            subject,
            payload,
            headers,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// What the consumer should do with a message once it has been handled
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeResponse {
    /// Processed; remove it from the consumer
    Ack,
    /// Failed in a way that may succeed later; redeliver
    Nak(Option<String>),
    /// Can never succeed; stop redelivering
    Term(String),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn nak(reason: impl Into<String>) -> Self {
        Self::Nak(Some(reason.into()))
    }

    pub fn term(reason: impl Into<String>) -> Self {
        Self::Term(reason.into())
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    pub fn is_nak(&self) -> bool {
        matches!(self, Self::Nak(_))
    }

    /// Short label used in log lines
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nak(_) => "nak",
            Self::Term(_) => "term",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_request_new() {
        let req = ConsumeRequest::new(
            "chat_ingress.requests".to_string(),
            Bytes::from("payload"),
            None,
        )
        .with_sequence(42);

        assert_eq!(req.subject, "chat_ingress.requests");
        assert_eq!(req.payload, Bytes::from("payload"));
        assert!(req.headers.is_none());
        assert_eq!(req.sequence, 42);
    }

    #[test]
    fn test_consume_response_outcomes() {
        assert!(ConsumeResponse::ack().is_ack());
        assert!(ConsumeResponse::nak("publish failed").is_nak());
        assert_eq!(ConsumeResponse::term("bad request").outcome(), "term");
        assert!(!ConsumeResponse::term("bad request").is_nak());
    }

    #[test]
    fn test_consume_response_nak_reason() {
        match ConsumeResponse::nak("nats unavailable") {
            ConsumeResponse::Nak(Some(reason)) => assert_eq!(reason, "nats unavailable"),
            other => panic!("Expected Nak with reason, got {:?}", other),
        }
    }
}
