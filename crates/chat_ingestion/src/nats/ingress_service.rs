use crate::domain::{IngestionRequest, IngestionService};
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, error, warn};

/// Tower service feeding gateway ingestion requests into the `IngestionService`.
///
/// Undecodable or invalid requests are terminated, publish failures are
/// nak'd so JetStream redelivers them.
#[derive(Clone)]
pub struct IngressConsumerService {
    ingestion_service: Arc<IngestionService>,
}

impl IngressConsumerService {
    pub fn new(ingestion_service: Arc<IngestionService>) -> Self {
        Self { ingestion_service }
    }
}

impl Service<ConsumeRequest> for IngressConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let ingestion_service = Arc::clone(&self.ingestion_service);

        Box::pin(async move {
            let request: IngestionRequest = match serde_json::from_slice(&req.payload) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, subject = %req.subject, "failed to decode ingestion request");
                    return Ok(ConsumeResponse::term(format!("Decode error: {e}")));
                }
            };

            let connection_id = request.connection_id.clone();

            match ingestion_service.ingest(request).await {
                Ok(_) => {
                    debug!(connection_id = %connection_id, "ingestion request published");
                    Ok(ConsumeResponse::ack())
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, connection_id = %connection_id, "publish failed, requesting redelivery");
                    Ok(ConsumeResponse::nak(e.to_string()))
                }
                Err(e) => {
                    warn!(error = %e, connection_id = %connection_id, "rejecting ingestion request");
                    Ok(ConsumeResponse::term(e.to_string()))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnvelopeBuilder;
    use bytes::Bytes;
    use common::domain::{DomainError, MockMessageEnvelopeProducer};

    fn consume_request(payload: &str) -> ConsumeRequest {
        ConsumeRequest::new(
            "chat_ingress.requests".to_string(),
            Bytes::from(payload.to_string()),
            None,
        )
    }

    fn service_with(producer: MockMessageEnvelopeProducer) -> IngressConsumerService {
        IngressConsumerService::new(Arc::new(IngestionService::new(
            EnvelopeBuilder::default(),
            Arc::new(producer),
        )))
    }

    #[tokio::test]
    async fn test_valid_request_is_acked() {
        let mut producer = MockMessageEnvelopeProducer::new();
        producer.expect_publish().times(1).returning(|_| Ok(()));

        let response = service_with(producer)
            .call(consume_request(
                r#"{"connectionId":"c1","userId":"u1","body":"{\"action\":\"run\"}"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response, ConsumeResponse::Ack);
    }

    #[tokio::test]
    async fn test_undecodable_request_is_terminated() {
        let mut producer = MockMessageEnvelopeProducer::new();
        producer.expect_publish().times(0);

        let response = service_with(producer)
            .call(consume_request("not json"))
            .await
            .unwrap();

        assert_eq!(response.outcome(), "term");
    }

    #[tokio::test]
    async fn test_missing_action_is_terminated() {
        let mut producer = MockMessageEnvelopeProducer::new();
        producer.expect_publish().times(0);

        let response = service_with(producer)
            .call(consume_request(
                r#"{"connectionId":"c1","userId":"u1","body":"{\"data\":{}}"}"#,
            ))
            .await
            .unwrap();

        match response {
            ConsumeResponse::Term(reason) => assert!(reason.contains("action")),
            other => panic!("expected Term, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_failure_is_nakd() {
        let mut producer = MockMessageEnvelopeProducer::new();
        producer
            .expect_publish()
            .times(1)
            .returning(|_| Err(DomainError::PublishError(anyhow::anyhow!("timed out"))));

        let response = service_with(producer)
            .call(consume_request(
                r#"{"connectionId":"c1","userId":"u1","body":"{\"action\":\"run\"}"}"#,
            ))
            .await
            .unwrap();

        assert!(response.is_nak());
    }
}
