use crate::domain::{EnvelopeBuilder, IngestionRequest};
use common::domain::{DomainResult, MessageEnvelope, MessageEnvelopeProducer};
use common::garde::validate_struct;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Client to backend direction: validate, build the envelope, publish it
pub struct IngestionService {
    builder: EnvelopeBuilder,
    producer: Arc<dyn MessageEnvelopeProducer>,
}

impl IngestionService {
    pub fn new(builder: EnvelopeBuilder, producer: Arc<dyn MessageEnvelopeProducer>) -> Self {
        Self { builder, producer }
    }

    /// Publish one ingestion request and return the envelope that was sent.
    ///
    /// Validation failures and publish failures are returned as-is, never retried here.
    #[instrument(skip(self, request), fields(connection_id = %request.connection_id, user_id = %request.user_id))]
    pub async fn ingest(&self, request: IngestionRequest) -> DomainResult<MessageEnvelope> {
        validate_struct(&request)?;

        let envelope = self.builder.build(&request)?;
        debug!(action = %envelope.action, model_interface = %envelope.model_interface, "built envelope");

        self.producer.publish(&envelope).await?;
        Ok(envelope)
    }
}
