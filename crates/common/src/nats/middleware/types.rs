use async_nats::HeaderMap;
use bytes::Bytes;

/// Request to publish a message to NATS
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub subject: String,
    pub payload: Bytes,
    /// Trace context is injected here by the tracing layer
    pub headers: HeaderMap,
    /// Identifier used to correlate log lines, e.g. the connection id
    pub correlation_id: Option<String>,
}

impl PublishRequest {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: HeaderMap::new(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Response from a publish operation
#[derive(Debug)]
pub struct PublishResponse {
    pub subject: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_request_defaults() {
        let req = PublishRequest::new("chat_messages.in", b"{}".to_vec());

        assert_eq!(req.subject, "chat_messages.in");
        assert_eq!(req.payload, Bytes::from_static(b"{}"));
        assert!(req.correlation_id.is_none());
    }

    #[test]
    fn test_publish_request_with_correlation_id() {
        let req = PublishRequest::new("chat_messages.in", Bytes::new()).with_correlation_id("c1");
        assert_eq!(req.correlation_id.as_deref(), Some("c1"));
    }
}
