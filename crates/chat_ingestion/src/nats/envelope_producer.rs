use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, MessageEnvelope, MessageEnvelopeProducer};
use common::nats::{JetStreamPublisher, PublishRequest, TracedPublisher, build_traced_publisher};
use std::sync::Arc;
use tower::Service;
use tracing::{debug, info};

/// Publishes envelopes on `{topic}.{direction}` of the messages stream
pub struct NatsEnvelopeProducer {
    publisher: TracedPublisher,
    topic: String,
}

impl NatsEnvelopeProducer {
    pub fn new(jetstream: Arc<dyn JetStreamPublisher>, topic: String) -> Self {
        debug!(topic = %topic, "initialized NatsEnvelopeProducer");

        Self {
            publisher: build_traced_publisher(jetstream, "chat_envelope_producer"),
            topic,
        }
    }

    fn subject_for(&self, envelope: &MessageEnvelope) -> String {
        format!("{}.{}", self.topic, envelope.direction.subject_token())
    }
}

#[async_trait]
impl MessageEnvelopeProducer for NatsEnvelopeProducer {
    async fn publish(&self, envelope: &MessageEnvelope) -> DomainResult<()> {
        let payload = serde_json::to_vec(envelope)?;
        let subject = self.subject_for(envelope);

        info!(
            connection_id = %envelope.connection_id,
            user_id = %envelope.user_id,
            action = %envelope.action,
            model_interface = %envelope.model_interface,
            direction = %envelope.direction,
            timestamp = %envelope.timestamp,
            "publishing message envelope"
        );

        let request =
            PublishRequest::new(subject, payload).with_correlation_id(&envelope.connection_id);

        self.publisher
            .clone()
            .call(request)
            .await
            .map_err(DomainError::PublishError)?;

        Ok(())
    }
}
